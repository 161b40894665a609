//! JSON REST API for the Questline progression engine.
//!
//! Exposes an axum [`Router`] over a [`TurnPipeline`] backed by any
//! [`questline_core::store::ProgressStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility — the chat front end talks to
//! this as its progression service.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", questline_api::api_router(pipeline.clone()))
//! ```

pub mod achievements;
pub mod error;
pub mod progress;
pub mod turns;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use questline_core::store::ProgressStore;
use questline_engine::TurnPipeline;
use serde::Deserialize;

pub use error::ApiError;

/// Server settings, deserialised from `config.toml` plus `QUESTLINE_*`
/// environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Address to bind, e.g. `127.0.0.1:8080`.
  pub bind_addr:  String,
  /// Path to the SQLite database file.
  pub store_path: String,
}

/// Build a fully-materialised API router for `pipeline`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(pipeline: Arc<TurnPipeline<S>>) -> Router<()>
where
  S: ProgressStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Turns
    .route("/turns", post(turns::submit::<S>))
    // Progress
    .route("/progress", get(progress::list::<S>))
    .route("/progress/{mission_id}", get(progress::get_one::<S>))
    .route("/progress/{mission_id}/time", post(progress::flush_time::<S>))
    .route("/missions/{mission_id}/reset", post(progress::reset::<S>))
    // XP and achievements
    .route("/xp", get(achievements::xp::<S>))
    .route("/achievements", get(achievements::list::<S>))
    .route("/events/stop", post(achievements::stop_event::<S>))
    .route("/events/export", post(achievements::export_event::<S>))
    .with_state(pipeline)
}
