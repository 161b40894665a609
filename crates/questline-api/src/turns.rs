//! Handler for `POST /turns` — one classified conversational turn.

use std::sync::Arc;

use axum::{Json, extract::State};
use questline_core::{
  decision::DecisionClassification, store::ProgressStore,
};
use questline_engine::{TurnInput, TurnOutcome, TurnPipeline};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// JSON body accepted by `POST /turns`.
#[derive(Debug, Deserialize)]
pub struct TurnBody {
  pub user_id:            Uuid,
  pub mission_id:         String,
  pub classification:     DecisionClassification,
  pub session_total_secs: Option<u32>,
  pub message_order:      Option<u32>,
}

/// `POST /turns` — run the full pipeline and return the [`TurnOutcome`].
///
/// Retrying with the same `classification.submission_id` is safe: the
/// response will carry `"replayed": true` and nothing is double-counted.
pub async fn submit<S>(
  State(pipeline): State<Arc<TurnPipeline<S>>>,
  Json(body): Json<TurnBody>,
) -> Result<Json<TurnOutcome>, ApiError>
where
  S: ProgressStore,
{
  let outcome = pipeline
    .submit_turn(TurnInput {
      user_id:            body.user_id,
      mission_id:         body.mission_id,
      classification:     body.classification,
      session_total_secs: body.session_total_secs,
      message_order:      body.message_order,
    })
    .await?;
  Ok(Json(outcome))
}
