//! Decision classification — the input unit of the progression engine.
//!
//! A classification arrives once per conversational turn from the upstream
//! language-model collaborator. It is untrusted: the type token may be
//! misspelled, the quality may be missing, and the whole thing may describe
//! no real decision at all. [`normalize`] turns it into a
//! [`NormalizedDecision`] without ever failing — a malformed classification
//! must never crash progression.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Decision type ───────────────────────────────────────────────────────────

/// The category a player choice was classified into.
///
/// `None` means the turn carried no real decision (small talk, a question,
/// a stalled exchange). It still exists as a variant so that progress
/// advancement can flow through turns that count toward nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionType {
  Diplomatic,
  Strategic,
  Action,
  Investigation,
  None,
}

impl DecisionType {
  /// The four countable types, in catalog order.
  pub const COUNTED: [DecisionType; 4] = [
    DecisionType::Diplomatic,
    DecisionType::Strategic,
    DecisionType::Action,
    DecisionType::Investigation,
  ];

  /// Parse an upstream token. Unrecognized tokens decode to `None` —
  /// fail-soft, so a hallucinated category degrades to "no decision"
  /// instead of an error.
  pub fn from_token(token: &str) -> Self {
    match token.trim().to_ascii_lowercase().as_str() {
      "diplomatic" => Self::Diplomatic,
      "strategic" => Self::Strategic,
      "action" => Self::Action,
      "investigation" => Self::Investigation,
      "none" => Self::None,
      other => {
        tracing::warn!(token = other, "unrecognized decision type, treating as none");
        Self::None
      }
    }
  }

  /// The token stored in database columns and wire payloads.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Diplomatic => "diplomatic",
      Self::Strategic => "strategic",
      Self::Action => "action",
      Self::Investigation => "investigation",
      Self::None => "none",
    }
  }
}

// ─── Decision quality ────────────────────────────────────────────────────────

/// How well the choice served the player, per the upstream judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionQuality {
  Good,
  Bad,
  /// Only ever present on raw input. Normalization resolves it to `Good`
  /// or `Bad`; it never survives into a [`NormalizedDecision`].
  Neutral,
}

impl DecisionQuality {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Good => "good",
      Self::Bad => "bad",
      Self::Neutral => "neutral",
    }
  }
}

// ─── Raw classification ──────────────────────────────────────────────────────

/// One classified player choice, exactly as supplied by the upstream model
/// call. All fields are optional or fail-soft except `submission_id`, which
/// the caller mints per logical decision so retries can be deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionClassification {
  /// Idempotency key: one per logical decision, reused across retries.
  pub submission_id:        Uuid,
  /// Raw type token; parsed leniently via [`DecisionType::from_token`].
  pub decision_type:        String,
  pub quality:              Option<DecisionQuality>,
  /// Gates whether this classification counts toward decision totals.
  #[serde(default)]
  pub is_story_decision:    bool,
  /// Mission-completion percentage points this turn is worth. Negative
  /// upstream values are clamped to zero during normalization.
  #[serde(default)]
  pub progress_advancement: f64,
  /// Multiplier derived from the mission difficulty tier. When absent the
  /// caller may fill it from the mission catalog; otherwise it defaults
  /// to 1.0.
  pub difficulty_bonus:     Option<f64>,
  /// Free text shown to the player; no effect on counters or XP.
  pub reasoning:            Option<String>,
}

// ─── Normalized decision ─────────────────────────────────────────────────────

/// A classification after the normalization rules have been applied.
/// `quality` is guaranteed to be `Good` or `Bad`, never `Neutral`.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedDecision {
  pub submission_id:        Uuid,
  pub decision_type:        DecisionType,
  pub quality:              DecisionQuality,
  /// True iff this decision counts toward statistics: story-relevant and
  /// typed as one of the four counted categories.
  pub is_valid_decision:    bool,
  pub progress_advancement: f64,
  pub difficulty_bonus:     f64,
  pub reasoning:            Option<String>,
}

/// Apply the normalization rules to a raw classification. Never fails.
///
/// The rules are deliberate policy, not leniency bugs:
///
/// 1. Unrecognized type tokens become [`DecisionType::None`].
/// 2. A `none` decision is forced to `quality = Good` — "no real decision"
///    must never read as punishing the player.
/// 3. A real (non-`none`) decision with a missing or `neutral` quality
///    defaults to `Bad`, with a logged warning. The upstream contract says
///    neutral should never happen on a real decision; defaulting keeps the
///    good/bad counter sums complete instead of silently dropping the turn.
pub fn normalize(input: &DecisionClassification) -> NormalizedDecision {
  let decision_type = DecisionType::from_token(&input.decision_type);

  let quality = if decision_type == DecisionType::None {
    DecisionQuality::Good
  } else {
    match input.quality {
      Some(DecisionQuality::Good) => DecisionQuality::Good,
      Some(DecisionQuality::Bad) => DecisionQuality::Bad,
      Some(DecisionQuality::Neutral) | None => {
        tracing::warn!(
          submission_id = %input.submission_id,
          decision_type = decision_type.as_str(),
          "missing or neutral quality on a real decision, defaulting to bad"
        );
        DecisionQuality::Bad
      }
    }
  };

  let is_valid_decision =
    input.is_story_decision && decision_type != DecisionType::None;

  NormalizedDecision {
    submission_id: input.submission_id,
    decision_type,
    quality,
    is_valid_decision,
    progress_advancement: input.progress_advancement.max(0.0),
    difficulty_bonus: input.difficulty_bonus.filter(|b| *b > 0.0).unwrap_or(1.0),
    reasoning: input.reasoning.clone(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(decision_type: &str) -> DecisionClassification {
    DecisionClassification {
      submission_id:        Uuid::new_v4(),
      decision_type:        decision_type.into(),
      quality:              Some(DecisionQuality::Good),
      is_story_decision:    true,
      progress_advancement: 0.0,
      difficulty_bonus:     None,
      reasoning:            None,
    }
  }

  #[test]
  fn unrecognized_token_becomes_none() {
    let norm = normalize(&raw("heroic"));
    assert_eq!(norm.decision_type, DecisionType::None);
    assert!(!norm.is_valid_decision);
  }

  #[test]
  fn token_parsing_is_case_insensitive() {
    let norm = normalize(&raw("  Strategic "));
    assert_eq!(norm.decision_type, DecisionType::Strategic);
  }

  #[test]
  fn none_forces_quality_good() {
    let mut input = raw("none");
    input.quality = Some(DecisionQuality::Bad);
    let norm = normalize(&input);
    assert_eq!(norm.quality, DecisionQuality::Good);
    assert!(!norm.is_valid_decision);
  }

  #[test]
  fn missing_quality_defaults_to_bad() {
    let mut input = raw("diplomatic");
    input.quality = None;
    assert_eq!(normalize(&input).quality, DecisionQuality::Bad);
  }

  #[test]
  fn neutral_quality_defaults_to_bad() {
    let mut input = raw("action");
    input.quality = Some(DecisionQuality::Neutral);
    assert_eq!(normalize(&input).quality, DecisionQuality::Bad);
  }

  #[test]
  fn non_story_decision_is_invalid() {
    let mut input = raw("strategic");
    input.is_story_decision = false;
    assert!(!normalize(&input).is_valid_decision);
  }

  #[test]
  fn negative_advancement_clamps_to_zero() {
    let mut input = raw("strategic");
    input.progress_advancement = -3.0;
    assert_eq!(normalize(&input).progress_advancement, 0.0);
  }

  #[test]
  fn missing_difficulty_bonus_defaults_to_one() {
    let norm = normalize(&raw("strategic"));
    assert_eq!(norm.difficulty_bonus, 1.0);
  }
}
