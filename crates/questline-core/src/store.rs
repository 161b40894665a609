//! The `ProgressStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `questline-store-sqlite`). The engine and API layers depend on this
//! abstraction, not on any concrete backend.
//!
//! Concurrency contract: the backend owns the only shared mutable state in
//! the system. Counter and XP mutations are expressed as *increments*, never
//! as read-modify-write from the caller, and every counter increment carries
//! a submission id so a retried write is a no-op instead of a double count.

use std::collections::HashSet;
use std::future::Future;

use uuid::Uuid;

use crate::{
  achievement::{AchievementId, OneShotFlag, OneShotFlags},
  progress::{CounterDelta, MissionProgress},
  xp::{UserXp, XpAward},
};

// ─── Write payloads ──────────────────────────────────────────────────────────

/// Field-level replacement patch for the UI-facing fields of a progress row.
/// `None` fields are left untouched. Counters are deliberately absent: they
/// only ever move through [`ProgressStore::record_decision`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressPatch {
  /// Absolute new value, already clamped to 0–100 by the caller.
  pub completion_percentage: Option<u8>,
  pub can_resume:            Option<bool>,
  pub last_message_order:    Option<u32>,
}

/// Result of applying a counter delta.
#[derive(Debug, Clone)]
pub enum DeltaOutcome {
  /// The increment was applied; the row is the post-increment state.
  Applied(MissionProgress),
  /// The submission id was seen before; nothing changed. The row is the
  /// current state, returned so callers still get a consistent view.
  Replayed(MissionProgress),
}

impl DeltaOutcome {
  pub fn progress(&self) -> &MissionProgress {
    match self {
      Self::Applied(p) | Self::Replayed(p) => p,
    }
  }

  pub fn is_replay(&self) -> bool { matches!(self, Self::Replayed(_)) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a progression storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ProgressStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Progress rows ─────────────────────────────────────────────────────

  /// Fetch one progress row. `None` if the user has never touched the
  /// mission.
  fn get_progress<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
  ) -> impl Future<Output = Result<Option<MissionProgress>, Self::Error>> + Send + 'a;

  /// All of a user's progress rows, across every mission. Achievement
  /// evaluation always starts from this fresh read.
  fn list_progress(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MissionProgress>, Self::Error>> + Send + '_;

  /// Create-or-merge the row for `(user_id, mission_id)`.
  ///
  /// Uses a single conflict-target upsert, so two concurrent creates for the
  /// same key converge on one row with neither caller seeing an error. The
  /// returned row is re-read after the write.
  fn upsert_progress<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
    patch: ProgressPatch,
  ) -> impl Future<Output = Result<MissionProgress, Self::Error>> + Send + 'a;

  /// Atomically record one turn's durable effects in a single transaction:
  /// the submission-ledger insert, the counter increments (`SET x = x + 1`,
  /// never read-modify-write) when the turn carried a valid decision, and
  /// the field patch.
  ///
  /// The ledger gates the whole write, delta or not: a `submission_id` seen
  /// before yields [`DeltaOutcome::Replayed`] and changes nothing — a
  /// retried turn can neither double-count counters nor re-apply its
  /// completion advancement. Committing the patch alongside the ledger
  /// entry also means a turn is never half-recorded: either all of its row
  /// effects landed, or the retry is not a replay and drives them again.
  fn record_decision<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
    delta: Option<CounterDelta>,
    patch: ProgressPatch,
    submission_id: Uuid,
  ) -> impl Future<Output = Result<DeltaOutcome, Self::Error>> + Send + 'a;

  /// Flush the session clock: sets `time_spent_secs` to
  /// `max(current, total_secs)`. Time never decreases.
  fn record_time<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
    total_secs: u32,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Set `completed_at` iff it is not already set. Returns `true` only for
  /// the call that performed the first crossing — the completion-bonus
  /// guard.
  fn mark_completed<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// The explicit "start fresh" action: delete the progress row and its
  /// submission-ledger entries in one transaction.
  fn reset_mission<'a>(
    &'a self,
    user_id: Uuid,
    mission_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── XP ────────────────────────────────────────────────────────────────

  /// Atomic `total_xp = total_xp + delta`. Returns the before/after totals
  /// so the caller can detect a level-up.
  fn add_xp(
    &self,
    user_id: Uuid,
    delta: u32,
  ) -> impl Future<Output = Result<XpAward, Self::Error>> + Send + '_;

  fn get_xp(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<UserXp, Self::Error>> + Send + '_;

  // ── Achievements ──────────────────────────────────────────────────────

  /// The persisted unlocked set. Evaluation must check against this, never
  /// an in-memory copy.
  fn unlocked_achievements(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<HashSet<AchievementId>, Self::Error>> + Send + '_;

  /// Append-only grant. Returns `false` when the achievement was already
  /// unlocked — a no-op, not an error.
  fn grant_achievement(
    &self,
    user_id: Uuid,
    id: AchievementId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── One-shot flags ────────────────────────────────────────────────────

  fn one_shot_flags(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<OneShotFlags, Self::Error>> + Send + '_;

  /// Set a one-shot flag. Returns `false` if it was already set.
  fn set_one_shot_flag(
    &self,
    user_id: Uuid,
    flag: OneShotFlag,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
