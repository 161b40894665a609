//! Mission progress — the durable per-(user, mission) aggregate.
//!
//! One row per (user, mission) pair; that composite key is the concurrency
//! boundary for the whole engine. [`apply_decision`] is the pure fold step:
//! it never performs I/O and never mutates in place. Persistence of the
//! resulting row (and the atomic counter increments that make concurrent
//! writers safe) is the store's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::{DecisionQuality, DecisionType, NormalizedDecision};

// ─── Counters ────────────────────────────────────────────────────────────────

/// Per-type decision tally. Invariant: `total == good + bad`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTally {
  pub total: u32,
  pub good:  u32,
  pub bad:   u32,
}

/// The full counter block of a progress row: three global counters plus one
/// [`TypeTally`] per counted decision type.
///
/// Invariants (checked by [`check_invariants`], enforced by construction in
/// [`apply_decision`]):
/// - `decisions_made == Σ tally.total`
/// - `good_decisions == Σ tally.good`, `bad_decisions == Σ tally.bad`
/// - `good_decisions + bad_decisions == decisions_made`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounters {
  pub decisions_made: u32,
  pub good_decisions: u32,
  pub bad_decisions:  u32,
  pub diplomatic:     TypeTally,
  pub strategic:      TypeTally,
  pub action:         TypeTally,
  pub investigation:  TypeTally,
}

impl DecisionCounters {
  /// The tally for a counted type. Panics on `DecisionType::None`, which by
  /// definition has no counters.
  pub fn tally(&self, t: DecisionType) -> &TypeTally {
    match t {
      DecisionType::Diplomatic => &self.diplomatic,
      DecisionType::Strategic => &self.strategic,
      DecisionType::Action => &self.action,
      DecisionType::Investigation => &self.investigation,
      DecisionType::None => unreachable!("none decisions have no tally"),
    }
  }

  fn tally_mut(&mut self, t: DecisionType) -> &mut TypeTally {
    match t {
      DecisionType::Diplomatic => &mut self.diplomatic,
      DecisionType::Strategic => &mut self.strategic,
      DecisionType::Action => &mut self.action,
      DecisionType::Investigation => &mut self.investigation,
      DecisionType::None => unreachable!("none decisions have no tally"),
    }
  }
}

// ─── Progress row ────────────────────────────────────────────────────────────

/// The durable aggregate for one user's run of one mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionProgress {
  pub user_id:               Uuid,
  pub mission_id:            String,
  /// 0–100. Direct assignment from the upstream value, not an increment;
  /// decreases are allowed (bad-choice penalties). Once 100 is reached,
  /// `completed_at` records it as a high-water mark.
  pub completion_percentage: u8,
  pub counters:              DecisionCounters,
  /// Cumulative wall-clock seconds; monotone non-decreasing.
  pub time_spent_secs:       u32,
  pub can_resume:            bool,
  /// Transcript bookkeeping owned by the chat collaborator.
  pub last_message_order:    u32,
  /// Set exactly once, on the first crossing into 100. The durable guard
  /// for the one-time completion bonus and the completion achievements.
  pub completed_at:          Option<DateTime<Utc>>,
  pub last_updated:          DateTime<Utc>,
}

impl MissionProgress {
  /// A zeroed row for a (user, mission) pair that has no persisted state yet.
  pub fn fresh(user_id: Uuid, mission_id: impl Into<String>) -> Self {
    Self {
      user_id,
      mission_id: mission_id.into(),
      completion_percentage: 0,
      counters: DecisionCounters::default(),
      time_spent_secs: 0,
      can_resume: false,
      last_message_order: 0,
      completed_at: None,
      last_updated: Utc::now(),
    }
  }

  /// Whether this row has ever reached 100% completion.
  pub fn is_completed(&self) -> bool { self.completed_at.is_some() }
}

// ─── Counter delta ───────────────────────────────────────────────────────────

/// The increment set one valid decision contributes: `decisions_made + 1`,
/// the matching type total + 1, and exactly one good/bad pair (coarse and
/// fine) + 1. Stores apply this as atomic `SET x = x + 1` updates so two
/// concurrent decisions never lose each other's counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta {
  pub decision_type: DecisionType,
  pub quality:       DecisionQuality,
}

impl CounterDelta {
  /// The delta for a normalized decision, or `None` when the decision is
  /// invalid and must not touch any counter.
  pub fn from_decision(d: &NormalizedDecision) -> Option<Self> {
    if !d.is_valid_decision {
      return None;
    }
    Some(Self {
      decision_type: d.decision_type,
      quality:       d.quality,
    })
  }
}

// ─── Pure fold step ──────────────────────────────────────────────────────────

/// Fold one normalized decision into a progress row, returning the new row.
///
/// - Valid decisions bump `decisions_made`, the matching type tally, and
///   exactly one good/bad coarse+fine counter pair.
/// - Invalid decisions leave all counters untouched.
/// - `new_completion`, when supplied, is assigned directly (the upstream
///   value is absolute, not a delta). Callers clamp to 0–100 before calling;
///   this function does not.
pub fn apply_decision(
  current: &MissionProgress,
  decision: &NormalizedDecision,
  new_completion: Option<u8>,
) -> MissionProgress {
  let mut next = current.clone();

  if decision.is_valid_decision {
    let c = &mut next.counters;
    c.decisions_made += 1;
    let tally = c.tally_mut(decision.decision_type);
    tally.total += 1;
    match decision.quality {
      DecisionQuality::Good => {
        c.good_decisions += 1;
        c.tally_mut(decision.decision_type).good += 1;
      }
      // Neutral cannot survive normalization; treat defensively as bad so
      // the coarse/fine sums stay closed.
      DecisionQuality::Bad | DecisionQuality::Neutral => {
        c.bad_decisions += 1;
        c.tally_mut(decision.decision_type).bad += 1;
      }
    }
  }

  if let Some(pct) = new_completion {
    next.completion_percentage = pct;
  }

  next.last_updated = Utc::now();
  next
}

// ─── Invariant check ─────────────────────────────────────────────────────────

/// One detected divergence between a counter and the sum it should equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDivergence {
  pub field:    &'static str,
  pub expected: u32,
  pub actual:   u32,
}

/// Verify the counter sum invariants on a row. Divergence is a data-quality
/// signal (partial writes, a buggy client), not a fatal condition: callers
/// log the result and continue.
pub fn check_invariants(progress: &MissionProgress) -> Vec<CounterDivergence> {
  let c = &progress.counters;
  let mut out = Vec::new();

  let mut check = |field, expected, actual| {
    if expected != actual {
      out.push(CounterDivergence { field, expected, actual });
    }
  };

  let type_total: u32 = DecisionType::COUNTED
    .iter()
    .map(|t| c.tally(*t).total)
    .sum();
  check("decisions_made", type_total, c.decisions_made);

  let good_total: u32 =
    DecisionType::COUNTED.iter().map(|t| c.tally(*t).good).sum();
  check("good_decisions", good_total, c.good_decisions);

  let bad_total: u32 =
    DecisionType::COUNTED.iter().map(|t| c.tally(*t).bad).sum();
  check("bad_decisions", bad_total, c.bad_decisions);

  check(
    "good_decisions + bad_decisions",
    c.decisions_made,
    c.good_decisions + c.bad_decisions,
  );

  for t in DecisionType::COUNTED {
    let tally = c.tally(t);
    if tally.total != tally.good + tally.bad {
      out.push(CounterDivergence {
        field:    t.as_str(),
        expected: tally.good + tally.bad,
        actual:   tally.total,
      });
    }
  }

  out
}
