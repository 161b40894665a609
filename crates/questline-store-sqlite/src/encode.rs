//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Enum tokens reuse the `as_str` forms from
//! `questline-core` so the database and the wire agree.

use chrono::{DateTime, Utc};
use questline_core::{
  achievement::AchievementId,
  decision::{DecisionQuality, DecisionType},
  progress::{DecisionCounters, MissionProgress, TypeTally},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Achievement ids ─────────────────────────────────────────────────────────

pub fn decode_achievement(s: &str) -> Result<AchievementId> {
  Ok(AchievementId::parse(s)?)
}

// ─── Counter columns ─────────────────────────────────────────────────────────

/// The coarse counter column for a counted decision type.
pub fn type_column(t: DecisionType) -> &'static str {
  match t {
    DecisionType::Diplomatic => "diplomatic_decisions",
    DecisionType::Strategic => "strategic_decisions",
    DecisionType::Action => "action_decisions",
    DecisionType::Investigation => "investigation_decisions",
    DecisionType::None => unreachable!("none decisions are never persisted"),
  }
}

/// The fine counter column for a (type, quality) pair.
pub fn fine_column(t: DecisionType, q: DecisionQuality) -> &'static str {
  match (t, q) {
    (DecisionType::Diplomatic, DecisionQuality::Good) => "diplomatic_good_decisions",
    (DecisionType::Strategic, DecisionQuality::Good) => "strategic_good_decisions",
    (DecisionType::Action, DecisionQuality::Good) => "action_good_decisions",
    (DecisionType::Investigation, DecisionQuality::Good) => "investigation_good_decisions",
    (DecisionType::Diplomatic, _) => "diplomatic_bad_decisions",
    (DecisionType::Strategic, _) => "strategic_bad_decisions",
    (DecisionType::Action, _) => "action_bad_decisions",
    (DecisionType::Investigation, _) => "investigation_bad_decisions",
    (DecisionType::None, _) => unreachable!("none decisions are never persisted"),
  }
}

/// The coarse quality column.
pub fn quality_column(q: DecisionQuality) -> &'static str {
  match q {
    DecisionQuality::Good => "good_decisions",
    // Neutral cannot survive normalization; map to bad like the aggregator.
    DecisionQuality::Bad | DecisionQuality::Neutral => "bad_decisions",
  }
}

// ─── Row structs ─────────────────────────────────────────────────────────────

/// Column order used by every `SELECT` against `mission_progress`.
pub const PROGRESS_COLUMNS: &str = "user_id, mission_id, \
  completion_percentage, decisions_made, good_decisions, bad_decisions, \
  diplomatic_decisions, diplomatic_good_decisions, diplomatic_bad_decisions, \
  strategic_decisions, strategic_good_decisions, strategic_bad_decisions, \
  action_decisions, action_good_decisions, action_bad_decisions, \
  investigation_decisions, investigation_good_decisions, investigation_bad_decisions, \
  time_spent_secs, can_resume, last_message_order, completed_at, last_updated";

/// A `mission_progress` row as read from SQLite, before decoding.
pub struct RawProgress {
  pub user_id:               String,
  pub mission_id:            String,
  pub completion_percentage: u8,
  pub counters:              [u32; 15],
  pub time_spent_secs:       u32,
  pub can_resume:            bool,
  pub last_message_order:    u32,
  pub completed_at:          Option<String>,
  pub last_updated:          String,
}

impl RawProgress {
  /// Build from a row selected with [`PROGRESS_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    let mut counters = [0u32; 15];
    for (i, c) in counters.iter_mut().enumerate() {
      *c = row.get(3 + i)?;
    }
    Ok(Self {
      user_id:               row.get(0)?,
      mission_id:            row.get(1)?,
      completion_percentage: row.get(2)?,
      counters,
      time_spent_secs:       row.get(18)?,
      can_resume:            row.get(19)?,
      last_message_order:    row.get(20)?,
      completed_at:          row.get(21)?,
      last_updated:          row.get(22)?,
    })
  }

  pub fn into_progress(self) -> Result<MissionProgress> {
    let [
      decisions_made,
      good_decisions,
      bad_decisions,
      dip,
      dip_good,
      dip_bad,
      strat,
      strat_good,
      strat_bad,
      act,
      act_good,
      act_bad,
      inv,
      inv_good,
      inv_bad,
    ] = self.counters;

    Ok(MissionProgress {
      user_id:               decode_uuid(&self.user_id)?,
      mission_id:            self.mission_id,
      completion_percentage: self.completion_percentage,
      counters:              DecisionCounters {
        decisions_made,
        good_decisions,
        bad_decisions,
        diplomatic: TypeTally { total: dip, good: dip_good, bad: dip_bad },
        strategic: TypeTally { total: strat, good: strat_good, bad: strat_bad },
        action: TypeTally { total: act, good: act_good, bad: act_bad },
        investigation: TypeTally { total: inv, good: inv_good, bad: inv_bad },
      },
      time_spent_secs:       self.time_spent_secs,
      can_resume:            self.can_resume,
      last_message_order:    self.last_message_order,
      completed_at:          self.completed_at.as_deref().map(decode_dt).transpose()?,
      last_updated:          decode_dt(&self.last_updated)?,
    })
  }
}
