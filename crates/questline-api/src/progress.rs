//! Handlers for `/progress` and mission lifecycle endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use questline_core::{progress::MissionProgress, store::ProgressStore};
use questline_engine::TurnPipeline;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct UserParams {
  pub user_id: Uuid,
}

/// `GET /progress?user_id=<id>` — all of a user's rows, across missions.
pub async fn list<S>(
  State(pipeline): State<Arc<TurnPipeline<S>>>,
  Query(params): Query<UserParams>,
) -> Result<Json<Vec<MissionProgress>>, ApiError>
where
  S: ProgressStore,
{
  Ok(Json(pipeline.all_progress(params.user_id).await?))
}

/// `GET /progress/:mission_id?user_id=<id>`
pub async fn get_one<S>(
  State(pipeline): State<Arc<TurnPipeline<S>>>,
  Path(mission_id): Path<String>,
  Query(params): Query<UserParams>,
) -> Result<Json<MissionProgress>, ApiError>
where
  S: ProgressStore,
{
  pipeline
    .mission_progress(params.user_id, &mission_id)
    .await?
    .map(Json)
    .ok_or_else(|| {
      ApiError::NotFound(format!("no progress for mission {mission_id:?}"))
    })
}

#[derive(Debug, Deserialize)]
pub struct FlushTimeBody {
  pub user_id:    Uuid,
  pub total_secs: u32,
}

/// `POST /progress/:mission_id/time` — flush the session clock (e.g. on tab
/// close). The stored value never decreases.
pub async fn flush_time<S>(
  State(pipeline): State<Arc<TurnPipeline<S>>>,
  Path(mission_id): Path<String>,
  Json(body): Json<FlushTimeBody>,
) -> Result<StatusCode, ApiError>
where
  S: ProgressStore,
{
  pipeline
    .flush_session_time(body.user_id, &mission_id, body.total_secs)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /missions/:mission_id/reset` — the explicit "start fresh" action.
pub async fn reset<S>(
  State(pipeline): State<Arc<TurnPipeline<S>>>,
  Path(mission_id): Path<String>,
  Json(body): Json<UserParams>,
) -> Result<StatusCode, ApiError>
where
  S: ProgressStore,
{
  pipeline.start_fresh(body.user_id, &mission_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
