//! [`TurnPipeline`] — the control flow of one progression turn.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use questline_core::{
  achievement::{self, AchievementId, UserStats},
  decision::{normalize, DecisionClassification, NormalizedDecision},
  mission,
  progress::{check_invariants, CounterDelta, MissionProgress},
  store::{ProgressPatch, ProgressStore},
  xp::{completion_bonus, decision_reward, level_for_xp, UserXp, XpAward},
};

use crate::{Error, Result};

// ─── Input / output ──────────────────────────────────────────────────────────

/// Everything one conversational turn hands the pipeline.
#[derive(Debug, Clone)]
pub struct TurnInput {
  pub user_id:        Uuid,
  pub mission_id:     String,
  /// The raw upstream classification; normalized inside the pipeline.
  pub classification: DecisionClassification,
  /// Cumulative session seconds from the session-clock collaborator, if it
  /// ticked this turn. The store keeps time monotone.
  pub session_total_secs: Option<u32>,
  /// Transcript bookkeeping from the chat collaborator.
  pub message_order:  Option<u32>,
}

/// What one turn produced, for the caller to surface to the player.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
  pub decision:       NormalizedDecision,
  pub progress:       MissionProgress,
  /// True when the submission id had been applied before; all counter and
  /// XP effects were skipped.
  pub replayed:       bool,
  pub decision_xp:    Option<XpAward>,
  pub completion_xp:  Option<XpAward>,
  /// XP granted by achievements unlocked this turn.
  pub achievement_xp: u32,
  pub newly_unlocked: Vec<AchievementId>,
  pub total_xp:       u64,
  pub level:          u32,
  pub leveled_up:     bool,
}

/// First and last XP totals touched this turn, for level-up detection
/// across several awards.
#[derive(Default)]
struct XpSpan {
  first_before: Option<u64>,
  last_after:   u64,
}

impl XpSpan {
  fn observe(&mut self, award: &XpAward) {
    self.first_before.get_or_insert(award.total_before);
    self.last_after = award.total_after;
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// The progression service. Generic over the storage backend; holds no
/// mutable state of its own.
#[derive(Clone)]
pub struct TurnPipeline<S> {
  store: S,
}

impl<S: ProgressStore> TurnPipeline<S> {
  pub fn new(store: S) -> Self { Self { store } }

  /// Direct access to the backend, for read-only callers.
  pub fn store(&self) -> &S { &self.store }

  // ── The main flow ─────────────────────────────────────────────────────

  /// Process one classified turn end to end.
  ///
  /// Failure anywhere leaves persisted state re-driveable: the caller may
  /// retry the same input, and the submission ledger guarantees counters
  /// and decision XP apply at most once.
  pub async fn submit_turn(&self, input: TurnInput) -> Result<TurnOutcome> {
    let mission = mission::find(&input.mission_id)?;
    let user_id = input.user_id;

    // The catalog, not the upstream model, is the authority on difficulty.
    let mut classification = input.classification;
    classification
      .difficulty_bonus
      .get_or_insert(mission.difficulty.bonus());
    let decision = normalize(&classification);

    let current = self
      .store
      .get_progress(user_id, &input.mission_id)
      .await
      .map_err(Error::store)?
      .unwrap_or_else(|| MissionProgress::fresh(user_id, &input.mission_id));

    // The upstream advancement is a delta over the last persisted value;
    // the row stores the absolute result, clamped to 100 here because the
    // aggregator deliberately does not clamp.
    let new_completion = if decision.progress_advancement > 0.0 {
      let bumped = current.completion_percentage as u32
        + decision.progress_advancement.round() as u32;
      Some(bumped.min(100) as u8)
    } else {
      None
    };

    // Safe before the ledger check: time is monotone (MAX), so a retry
    // flushing the same session total is already a no-op.
    if let Some(secs) = input.session_total_secs {
      self
        .store
        .record_time(user_id, &input.mission_id, secs)
        .await
        .map_err(Error::store)?;
    }

    // One transaction for the whole turn's row effects: the ledger entry,
    // the counter increments (if the decision counted), and the field
    // patch. Every turn goes through this gate, so a retry of *any*
    // submission — valid decision or not — replays instead of re-applying
    // its completion advancement.
    let outcome = self
      .store
      .record_decision(
        user_id,
        &input.mission_id,
        CounterDelta::from_decision(&decision),
        ProgressPatch {
          completion_percentage: new_completion,
          can_resume: Some(true),
          last_message_order: input.message_order,
        },
        decision.submission_id,
      )
      .await
      .map_err(Error::store)?;

    if outcome.is_replay() {
      tracing::debug!(
        submission_id = %decision.submission_id,
        mission = %input.mission_id,
        "replayed submission, skipping row and XP effects"
      );
      let xp = self.store.get_xp(user_id).await.map_err(Error::store)?;
      return Ok(TurnOutcome {
        decision,
        progress: outcome.progress().clone(),
        replayed: true,
        decision_xp: None,
        completion_xp: None,
        achievement_xp: 0,
        newly_unlocked: Vec::new(),
        total_xp: xp.total_xp,
        level: xp.level(),
        leveled_up: false,
      });
    }

    let mut progress = outcome.progress().clone();

    for divergence in check_invariants(&progress) {
      tracing::warn!(
        mission = %input.mission_id,
        field = divergence.field,
        expected = divergence.expected,
        actual = divergence.actual,
        "counter sum divergence"
      );
    }

    let mut span = XpSpan::default();

    let reward = decision_reward(&decision);
    let decision_xp = if reward > 0 {
      let award = self.store.add_xp(user_id, reward).await.map_err(Error::store)?;
      span.observe(&award);
      Some(award)
    } else {
      None
    };

    // Completion bonus fires only on the call that performed the first
    // crossing into 100; the store's completed_at guard owns that edge.
    let mut completion_xp = None;
    if progress.completion_percentage == 100
      && self
        .store
        .mark_completed(user_id, &input.mission_id)
        .await
        .map_err(Error::store)?
    {
      let bonus = completion_bonus(
        progress.completion_percentage,
        progress.counters.good_decisions,
      );
      let award = self.store.add_xp(user_id, bonus).await.map_err(Error::store)?;
      span.observe(&award);
      completion_xp = Some(award);
      tracing::info!(mission = %input.mission_id, bonus, "mission completed");

      progress = self
        .store
        .get_progress(user_id, &input.mission_id)
        .await
        .map_err(Error::store)?
        .unwrap_or(progress);
    }

    let (newly_unlocked, achievement_xp) = self
      .evaluate_achievements(user_id, Some(&input.mission_id), &mut span)
      .await?;

    let (total_xp, level, leveled_up) = self.finish_span(user_id, span).await?;

    Ok(TurnOutcome {
      decision,
      progress,
      replayed: false,
      decision_xp,
      completion_xp,
      achievement_xp,
      newly_unlocked,
      total_xp,
      level,
      leveled_up,
    })
  }

  // ── Externally triggered achievements ─────────────────────────────────

  /// First use of the early-termination command unlocks `stop_master`.
  pub async fn trigger_stop_command(
    &self,
    user_id: Uuid,
  ) -> Result<Vec<AchievementId>> {
    self
      .store
      .set_one_shot_flag(user_id, questline_core::achievement::OneShotFlag::StopCommand)
      .await
      .map_err(Error::store)?;
    self.evaluate_only(user_id).await
  }

  /// A statistics export unlocks `social_butterfly`.
  pub async fn record_export(&self, user_id: Uuid) -> Result<Vec<AchievementId>> {
    self
      .store
      .set_one_shot_flag(user_id, questline_core::achievement::OneShotFlag::Export)
      .await
      .map_err(Error::store)?;
    self.evaluate_only(user_id).await
  }

  // ── Session and lifecycle passthroughs ────────────────────────────────

  /// Flush the session clock outside a turn (e.g. on tab close).
  pub async fn flush_session_time(
    &self,
    user_id: Uuid,
    mission_id: &str,
    total_secs: u32,
  ) -> Result<()> {
    self
      .store
      .record_time(user_id, mission_id, total_secs)
      .await
      .map_err(Error::store)
  }

  /// The explicit "start fresh" action: drop the row and its ledger.
  pub async fn start_fresh(&self, user_id: Uuid, mission_id: &str) -> Result<()> {
    mission::find(mission_id)?;
    self
      .store
      .reset_mission(user_id, mission_id)
      .await
      .map_err(Error::store)
  }

  pub async fn user_xp(&self, user_id: Uuid) -> Result<UserXp> {
    self.store.get_xp(user_id).await.map_err(Error::store)
  }

  pub async fn all_progress(&self, user_id: Uuid) -> Result<Vec<MissionProgress>> {
    self.store.list_progress(user_id).await.map_err(Error::store)
  }

  pub async fn mission_progress(
    &self,
    user_id: Uuid,
    mission_id: &str,
  ) -> Result<Option<MissionProgress>> {
    self
      .store
      .get_progress(user_id, mission_id)
      .await
      .map_err(Error::store)
  }

  pub async fn unlocked(&self, user_id: Uuid) -> Result<HashSet<AchievementId>> {
    self
      .store
      .unlocked_achievements(user_id)
      .await
      .map_err(Error::store)
  }

  // ── Internals ─────────────────────────────────────────────────────────

  /// Re-read cumulative state, run the catalog, grant what is newly
  /// satisfied, and award rarity XP for each grant that won.
  async fn evaluate_achievements(
    &self,
    user_id: Uuid,
    current_mission: Option<&str>,
    span: &mut XpSpan,
  ) -> Result<(Vec<AchievementId>, u32)> {
    // Always a fresh read: never trust a locally accumulated value.
    let rows = self.store.list_progress(user_id).await.map_err(Error::store)?;
    let flags = self.store.one_shot_flags(user_id).await.map_err(Error::store)?;
    let unlocked = self
      .store
      .unlocked_achievements(user_id)
      .await
      .map_err(Error::store)?;

    let stats = UserStats::fold(&rows, current_mission, flags);
    let candidates = achievement::evaluate(&stats, &unlocked);

    let mut granted = Vec::new();
    let mut xp_total = 0u32;
    for id in candidates {
      // A concurrent tab may have granted it between the read and here;
      // the grant is the arbiter, and losing is a no-op.
      if self
        .store
        .grant_achievement(user_id, id)
        .await
        .map_err(Error::store)?
      {
        let reward = achievement::def(id).rarity.xp_reward();
        let award = self.store.add_xp(user_id, reward).await.map_err(Error::store)?;
        span.observe(&award);
        xp_total += reward;
        tracing::info!(achievement = id.as_str(), reward, "achievement unlocked");
        granted.push(id);
      }
    }

    Ok((granted, xp_total))
  }

  async fn evaluate_only(&self, user_id: Uuid) -> Result<Vec<AchievementId>> {
    let mut span = XpSpan::default();
    let (granted, _) = self.evaluate_achievements(user_id, None, &mut span).await?;
    Ok(granted)
  }

  /// Resolve the turn's final XP view from the awards it made, falling back
  /// to a read when nothing was awarded.
  async fn finish_span(
    &self,
    user_id: Uuid,
    span: XpSpan,
  ) -> Result<(u64, u32, bool)> {
    match span.first_before {
      Some(before) => {
        let after = span.last_after;
        Ok((
          after,
          level_for_xp(after),
          level_for_xp(after) > level_for_xp(before),
        ))
      }
      None => {
        let xp = self.store.get_xp(user_id).await.map_err(Error::store)?;
        Ok((xp.total_xp, xp.level(), false))
      }
    }
  }
}
