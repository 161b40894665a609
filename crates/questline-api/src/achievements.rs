//! Handlers for XP, the achievement catalog, and externally triggered
//! achievement events.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use questline_core::{
  achievement::{self, AchievementId, Rarity},
  store::ProgressStore,
  xp::UserXp,
};
use questline_engine::TurnPipeline;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, progress::UserParams};

/// `GET /xp?user_id=<id>` — lifetime total plus the derived level.
pub async fn xp<S>(
  State(pipeline): State<Arc<TurnPipeline<S>>>,
  Query(params): Query<UserParams>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ProgressStore,
{
  let UserXp { user_id, total_xp } = pipeline.user_xp(params.user_id).await?;
  let level = questline_core::xp::level_for_xp(total_xp);
  Ok(Json(serde_json::json!({
    "user_id": user_id,
    "total_xp": total_xp,
    "level": level,
  })))
}

/// One catalog entry with the caller's unlock state attached.
#[derive(Debug, Serialize)]
pub struct AchievementView {
  pub id:          AchievementId,
  pub name:        &'static str,
  pub description: &'static str,
  pub rarity:      Rarity,
  pub xp_reward:   u32,
  pub unlocked:    bool,
}

/// `GET /achievements?user_id=<id>` — the full catalog, flagged with what
/// the user has unlocked.
pub async fn list<S>(
  State(pipeline): State<Arc<TurnPipeline<S>>>,
  Query(params): Query<UserParams>,
) -> Result<Json<Vec<AchievementView>>, ApiError>
where
  S: ProgressStore,
{
  let unlocked = pipeline.unlocked(params.user_id).await?;
  let views = achievement::CATALOG
    .iter()
    .map(|d| AchievementView {
      id:          d.id,
      name:        d.name,
      description: d.description,
      rarity:      d.rarity,
      xp_reward:   d.rarity.xp_reward(),
      unlocked:    unlocked.contains(&d.id),
    })
    .collect();
  Ok(Json(views))
}

#[derive(Debug, Deserialize)]
pub struct EventBody {
  pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
  pub newly_unlocked: Vec<AchievementId>,
}

/// `POST /events/stop` — first use of the early-termination command.
pub async fn stop_event<S>(
  State(pipeline): State<Arc<TurnPipeline<S>>>,
  Json(body): Json<EventBody>,
) -> Result<Json<EventResponse>, ApiError>
where
  S: ProgressStore,
{
  let newly_unlocked = pipeline.trigger_stop_command(body.user_id).await?;
  Ok(Json(EventResponse { newly_unlocked }))
}

/// `POST /events/export` — a statistics export.
pub async fn export_event<S>(
  State(pipeline): State<Arc<TurnPipeline<S>>>,
  Json(body): Json<EventBody>,
) -> Result<Json<EventResponse>, ApiError>
where
  S: ProgressStore,
{
  let newly_unlocked = pipeline.record_export(body.user_id).await?;
  Ok(Json(EventResponse { newly_unlocked }))
}
