//! Error types for `questline-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown mission: {0}")]
  UnknownMission(String),

  #[error("unknown achievement id: {0:?}")]
  UnknownAchievement(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
