//! Error type for `questline-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] questline_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum token this build does not recognise.
  #[error("unknown stored token: {0}")]
  UnknownToken(String),

  /// A row that should exist after an upsert could not be read back.
  #[error("progress row missing after write: user {user_id} mission {mission_id}")]
  RowMissingAfterWrite { user_id: uuid::Uuid, mission_id: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
