//! Achievement catalog and evaluator.
//!
//! The catalog is static and immutable. Every predicate is a pure function
//! of [`UserStats`] — a fold over all of the user's progress rows plus two
//! externally triggered one-shot flags — so the evaluator can run after any
//! mutation, in any order, without penalty. Unlock state lives in the store:
//! [`evaluate`] is always called with the *persisted* unlocked set, never an
//! in-memory one, so it survives restarts and multiple tabs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
  decision::DecisionType,
  progress::MissionProgress,
  Error, Result,
};

// ─── Ids ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
  FirstMission,
  AllMissions,
  Diplomat,
  Strategist,
  ActionHero,
  Detective,
  Explorer,
  Perfectionist,
  SpeedRunner,
  Storyteller,
  StopMaster,
  SocialButterfly,
}

impl AchievementId {
  /// The token stored in the `unlocked_achievements` table.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::FirstMission => "first_mission",
      Self::AllMissions => "all_missions",
      Self::Diplomat => "diplomat",
      Self::Strategist => "strategist",
      Self::ActionHero => "action_hero",
      Self::Detective => "detective",
      Self::Explorer => "explorer",
      Self::Perfectionist => "perfectionist",
      Self::SpeedRunner => "speed_runner",
      Self::Storyteller => "storyteller",
      Self::StopMaster => "stop_master",
      Self::SocialButterfly => "social_butterfly",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    CATALOG
      .iter()
      .map(|def| def.id)
      .find(|id| id.as_str() == s)
      .ok_or_else(|| Error::UnknownAchievement(s.to_owned()))
  }
}

// ─── Rarity ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
  Common,
  Rare,
  Epic,
  Legendary,
}

impl Rarity {
  /// XP granted once, when the achievement unlocks.
  pub fn xp_reward(&self) -> u32 {
    match self {
      Self::Common => 50,
      Self::Rare => 100,
      Self::Epic => 200,
      Self::Legendary => 500,
    }
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A catalog entry. The predicate itself lives in [`UserStats::satisfies`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AchievementDef {
  pub id:          AchievementId,
  pub name:        &'static str,
  pub description: &'static str,
  pub rarity:      Rarity,
}

/// Decisions of one type needed for the per-type achievements.
pub const TYPE_MASTERY_THRESHOLD: u32 = 3;
/// Total decisions needed for `explorer`.
pub const EXPLORER_THRESHOLD: u32 = 10;
/// Good decisions in a single flawless mission for `perfectionist`.
pub const PERFECTIONIST_THRESHOLD: u32 = 5;
/// `speed_runner`: mission completed in under this many seconds.
pub const SPEED_RUN_SECS: u32 = 180;
/// `storyteller`: any mission played longer than this many seconds.
pub const STORYTELLER_SECS: u32 = 300;

pub const CATALOG: &[AchievementDef] = &[
  AchievementDef {
    id:          AchievementId::FirstMission,
    name:        "First Steps",
    description: "Complete your first mission",
    rarity:      Rarity::Common,
  },
  AchievementDef {
    id:          AchievementId::AllMissions,
    name:        "Campaign Veteran",
    description: "Complete all four missions",
    rarity:      Rarity::Legendary,
  },
  AchievementDef {
    id:          AchievementId::Diplomat,
    name:        "Diplomat",
    description: "Make three diplomatic decisions",
    rarity:      Rarity::Common,
  },
  AchievementDef {
    id:          AchievementId::Strategist,
    name:        "Strategist",
    description: "Make three strategic decisions",
    rarity:      Rarity::Common,
  },
  AchievementDef {
    id:          AchievementId::ActionHero,
    name:        "Action Hero",
    description: "Make three action decisions",
    rarity:      Rarity::Common,
  },
  AchievementDef {
    id:          AchievementId::Detective,
    name:        "Detective",
    description: "Make three investigation decisions",
    rarity:      Rarity::Common,
  },
  AchievementDef {
    id:          AchievementId::Explorer,
    name:        "Explorer",
    description: "Make ten decisions across all missions",
    rarity:      Rarity::Rare,
  },
  AchievementDef {
    id:          AchievementId::Perfectionist,
    name:        "Perfectionist",
    description: "Finish a mission with five good decisions and none bad",
    rarity:      Rarity::Epic,
  },
  AchievementDef {
    id:          AchievementId::SpeedRunner,
    name:        "Speed Runner",
    description: "Complete a mission in under three minutes",
    rarity:      Rarity::Rare,
  },
  AchievementDef {
    id:          AchievementId::Storyteller,
    name:        "Storyteller",
    description: "Spend more than five minutes in one mission",
    rarity:      Rarity::Common,
  },
  AchievementDef {
    id:          AchievementId::StopMaster,
    name:        "Knowing When to Stop",
    description: "Use the stop command for the first time",
    rarity:      Rarity::Rare,
  },
  AchievementDef {
    id:          AchievementId::SocialButterfly,
    name:        "Social Butterfly",
    description: "Export your mission statistics",
    rarity:      Rarity::Common,
  },
];

/// Look up the catalog entry for an id. The catalog covers every id, so
/// this never fails.
pub fn def(id: AchievementId) -> &'static AchievementDef {
  CATALOG
    .iter()
    .find(|d| d.id == id)
    .expect("catalog covers every AchievementId")
}

// ─── One-shot flags ──────────────────────────────────────────────────────────

/// Externally triggered achievement sources that are not counter predicates:
/// set once per user, never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneShotFlag {
  StopCommand,
  Export,
}

impl OneShotFlag {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::StopCommand => "stop_command",
      Self::Export => "export",
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OneShotFlags {
  pub stop_command_used: bool,
  pub exported_stats:    bool,
}

// ─── Cumulative stats ────────────────────────────────────────────────────────

/// The fold of all of a user's progress rows into the quantities the
/// predicates consume. Always built from freshly re-read rows, never from a
/// locally accumulated value.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct UserStats {
  pub missions_completed:      u32,
  pub decisions_made:          u32,
  pub diplomatic_decisions:    u32,
  pub strategic_decisions:     u32,
  pub action_decisions:        u32,
  pub investigation_decisions: u32,
  /// Some row has `good >= 5` and `bad == 0`.
  pub has_flawless_mission:    bool,
  /// Some row has more than [`STORYTELLER_SECS`] on the clock.
  pub has_long_session:        bool,
  /// The mission of the current turn was completed in under
  /// [`SPEED_RUN_SECS`].
  pub current_mission_speedrun: bool,
  pub stop_command_used:       bool,
  pub exported_stats:          bool,
}

impl UserStats {
  /// Fold progress rows (across *all* missions) plus the one-shot flags.
  /// `current_mission` scopes the speed-runner predicate to the mission the
  /// triggering turn belongs to.
  pub fn fold(
    rows: &[MissionProgress],
    current_mission: Option<&str>,
    flags: OneShotFlags,
  ) -> Self {
    let mut stats = Self {
      stop_command_used: flags.stop_command_used,
      exported_stats: flags.exported_stats,
      ..Self::default()
    };

    for row in rows {
      let c = &row.counters;
      stats.decisions_made += c.decisions_made;
      stats.diplomatic_decisions += c.diplomatic.total;
      stats.strategic_decisions += c.strategic.total;
      stats.action_decisions += c.action.total;
      stats.investigation_decisions += c.investigation.total;

      if row.is_completed() {
        stats.missions_completed += 1;
      }
      if c.good_decisions >= PERFECTIONIST_THRESHOLD && c.bad_decisions == 0 {
        stats.has_flawless_mission = true;
      }
      if row.time_spent_secs > STORYTELLER_SECS {
        stats.has_long_session = true;
      }
      if current_mission == Some(row.mission_id.as_str())
        && row.is_completed()
        && row.time_spent_secs < SPEED_RUN_SECS
      {
        stats.current_mission_speedrun = true;
      }
    }

    stats
  }

  fn type_sum(&self, t: DecisionType) -> u32 {
    match t {
      DecisionType::Diplomatic => self.diplomatic_decisions,
      DecisionType::Strategic => self.strategic_decisions,
      DecisionType::Action => self.action_decisions,
      DecisionType::Investigation => self.investigation_decisions,
      DecisionType::None => 0,
    }
  }

  /// The predicate for one achievement.
  pub fn satisfies(&self, id: AchievementId) -> bool {
    match id {
      AchievementId::FirstMission => self.missions_completed >= 1,
      AchievementId::AllMissions => {
        self.missions_completed >= crate::mission::CATALOG.len() as u32
      }
      AchievementId::Diplomat => {
        self.type_sum(DecisionType::Diplomatic) >= TYPE_MASTERY_THRESHOLD
      }
      AchievementId::Strategist => {
        self.type_sum(DecisionType::Strategic) >= TYPE_MASTERY_THRESHOLD
      }
      AchievementId::ActionHero => {
        self.type_sum(DecisionType::Action) >= TYPE_MASTERY_THRESHOLD
      }
      AchievementId::Detective => {
        self.type_sum(DecisionType::Investigation) >= TYPE_MASTERY_THRESHOLD
      }
      AchievementId::Explorer => self.decisions_made >= EXPLORER_THRESHOLD,
      AchievementId::Perfectionist => self.has_flawless_mission,
      AchievementId::SpeedRunner => self.current_mission_speedrun,
      AchievementId::Storyteller => self.has_long_session,
      AchievementId::StopMaster => self.stop_command_used,
      AchievementId::SocialButterfly => self.exported_stats,
    }
  }
}

// ─── Evaluator ───────────────────────────────────────────────────────────────

/// Run the full catalog against `stats` and return the ids that are newly
/// satisfied — ids already in `unlocked` are never returned, so re-running
/// on unchanged state yields an empty result.
pub fn evaluate(
  stats: &UserStats,
  unlocked: &HashSet<AchievementId>,
) -> Vec<AchievementId> {
  CATALOG
    .iter()
    .map(|d| d.id)
    .filter(|id| !unlocked.contains(id) && stats.satisfies(*id))
    .collect()
}
