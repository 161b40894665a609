//! The static mission catalog — read-only reference data.
//!
//! Missions are defined by the content pipeline, not by users; the engine
//! only needs their ids and difficulty tiers. The catalog length is also
//! what the `all_missions` achievement counts against.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
  Expert,
}

impl Difficulty {
  /// The XP multiplier for this tier.
  pub fn bonus(&self) -> f64 {
    match self {
      Self::Easy => 1.0,
      Self::Medium => 1.25,
      Self::Hard => 1.5,
      Self::Expert => 2.0,
    }
  }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MissionDef {
  pub id:         &'static str,
  pub title:      &'static str,
  pub difficulty: Difficulty,
}

pub const CATALOG: &[MissionDef] = &[
  MissionDef {
    id:         "first-contact",
    title:      "First Contact",
    difficulty: Difficulty::Easy,
  },
  MissionDef {
    id:         "the-broken-cipher",
    title:      "The Broken Cipher",
    difficulty: Difficulty::Medium,
  },
  MissionDef {
    id:         "midnight-extraction",
    title:      "Midnight Extraction",
    difficulty: Difficulty::Hard,
  },
  MissionDef {
    id:         "the-last-envoy",
    title:      "The Last Envoy",
    difficulty: Difficulty::Expert,
  },
];

/// Look up a mission by id.
pub fn find(id: &str) -> Result<&'static MissionDef> {
  CATALOG
    .iter()
    .find(|m| m.id == id)
    .ok_or_else(|| Error::UnknownMission(id.to_owned()))
}
