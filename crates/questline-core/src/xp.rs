//! XP and level math. Everything here is a pure function; the atomic
//! `total_xp = total_xp + delta` write lives in the store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::{DecisionQuality, NormalizedDecision};

/// XP required per level. `level = total_xp / 200 + 1`.
pub const LEVEL_XP_QUANTUM: u64 = 200;

/// Base XP for a good decision, before the difficulty multiplier.
pub const GOOD_DECISION_XP: f64 = 5.0;

/// The level derived from a lifetime XP total. Levels start at 1.
pub fn level_for_xp(total_xp: u64) -> u32 {
  (total_xp / LEVEL_XP_QUANTUM) as u32 + 1
}

/// XP earned by one normalized decision.
///
/// Two additive, independent terms:
/// - `round(5 * difficulty_bonus)` when the decision is valid and good;
/// - `round(progress_advancement * difficulty_bonus)` whenever the turn
///   advances the story, valid decision or not.
///
/// A single good decision that also advances the story earns both.
pub fn decision_reward(decision: &NormalizedDecision) -> u32 {
  let mut xp = 0u32;

  if decision.is_valid_decision && decision.quality == DecisionQuality::Good {
    xp += (GOOD_DECISION_XP * decision.difficulty_bonus).round() as u32;
  }

  if decision.progress_advancement > 0.0 {
    xp += (decision.progress_advancement * decision.difficulty_bonus).round()
      as u32;
  }

  xp
}

/// One-time bonus for finishing a mission: awarded on the first crossing
/// into 100% only — the store's `mark_completed` guard makes sure later
/// fluctuation around 100 never re-awards it.
pub fn completion_bonus(completion_percentage: u8, good_decisions: u32) -> u32 {
  completion_percentage as u32 * 2 + good_decisions * 5 + 200
}

// ─── XP state ────────────────────────────────────────────────────────────────

/// A user's lifetime XP total. `level` is always derived, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserXp {
  pub user_id:  Uuid,
  pub total_xp: u64,
}

impl UserXp {
  pub fn level(&self) -> u32 { level_for_xp(self.total_xp) }
}

/// The result of one atomic XP increment, as reported by the store.
/// Level-ups are detected by comparing derived levels before and after,
/// never by mutating a stored level field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct XpAward {
  pub delta:        u32,
  pub total_before: u64,
  pub total_after:  u64,
}

impl XpAward {
  pub fn level_before(&self) -> u32 { level_for_xp(self.total_before) }

  pub fn level_after(&self) -> u32 { level_for_xp(self.total_after) }

  pub fn leveled_up(&self) -> bool { self.level_after() > self.level_before() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decision::DecisionType;

  fn decision(
    quality: DecisionQuality,
    valid: bool,
    advancement: f64,
    bonus: f64,
  ) -> NormalizedDecision {
    NormalizedDecision {
      submission_id: Uuid::new_v4(),
      decision_type: DecisionType::Strategic,
      quality,
      is_valid_decision: valid,
      progress_advancement: advancement,
      difficulty_bonus: bonus,
      reasoning: None,
    }
  }

  #[test]
  fn level_derivation_is_pure() {
    assert_eq!(level_for_xp(0), 1);
    assert_eq!(level_for_xp(199), 1);
    assert_eq!(level_for_xp(200), 2);
    assert_eq!(level_for_xp(399), 2);
    assert_eq!(level_for_xp(400), 3);
    assert_eq!(level_for_xp(1000), 6);
  }

  #[test]
  fn good_decision_with_advancement_earns_both_terms() {
    // round(5 * 1.5) + round(10 * 1.5) = 8 + 15
    let d = decision(DecisionQuality::Good, true, 10.0, 1.5);
    assert_eq!(decision_reward(&d), 23);
  }

  #[test]
  fn invalid_decision_still_earns_the_progress_term() {
    let d = decision(DecisionQuality::Good, false, 5.0, 1.0);
    assert_eq!(decision_reward(&d), 5);
  }

  #[test]
  fn bad_decision_without_advancement_earns_nothing() {
    let d = decision(DecisionQuality::Bad, true, 0.0, 2.0);
    assert_eq!(decision_reward(&d), 0);
  }

  #[test]
  fn completion_bonus_formula() {
    // 100*2 + 4*5 + 200
    assert_eq!(completion_bonus(100, 4), 420);
    assert_eq!(completion_bonus(100, 0), 400);
  }

  #[test]
  fn award_within_a_quantum_never_levels_up() {
    let award = XpAward { delta: 50, total_before: 210, total_after: 260 };
    assert!(!award.leveled_up());
    assert_eq!(award.level_after(), 2);
  }

  #[test]
  fn award_crossing_a_quantum_levels_up() {
    let award = XpAward { delta: 50, total_before: 180, total_after: 230 };
    assert!(award.leveled_up());
    assert_eq!(award.level_before(), 1);
    assert_eq!(award.level_after(), 2);
  }
}
