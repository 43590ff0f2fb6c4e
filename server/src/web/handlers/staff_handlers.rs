// server/src/web/handlers/staff_handlers.rs

use actix_web::{web, HttpResponse};
use marketplace_commit::TransitionOutcome;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::StaffUser;

#[derive(Deserialize, Debug)]
pub struct RestockPayload {
  pub amount: i64,
}

#[derive(Deserialize, Debug)]
pub struct ScorePayload {
  pub score: i64,
}

fn transition_response(outcome: TransitionOutcome) -> HttpResponse {
  HttpResponse::Ok().json(json!({
    "order": outcome.order,
    "stage": outcome.order.stage(),
    "applied": outcome.applied,
  }))
}

#[instrument(name = "handler::ship_order", skip(app_state, _staff))]
pub async fn ship_order_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let outcome = app_state.fulfillment.mark_shipped(path.into_inner()).await?;
  Ok(transition_response(outcome))
}

#[instrument(name = "handler::deliver_order", skip(app_state, _staff))]
pub async fn deliver_order_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let outcome = app_state.fulfillment.mark_delivered(path.into_inner()).await?;
  Ok(transition_response(outcome))
}

#[instrument(name = "handler::restock_variant", skip(app_state, _staff, payload), fields(amount = payload.amount))]
pub async fn restock_variant_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  path: web::Path<Uuid>,
  payload: web::Json<RestockPayload>,
) -> Result<HttpResponse, AppError> {
  let variant = app_state.admin.restock(path.into_inner(), payload.amount).await?;
  Ok(HttpResponse::Ok().json(variant))
}

#[instrument(name = "handler::approve_listing", skip(app_state, _staff))]
pub async fn approve_listing_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let listing = app_state.admin.approve_listing(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(listing))
}

/// Records the sustainability score the annotator produced for an item.
#[instrument(name = "handler::set_item_score", skip(app_state, _staff, payload), fields(score = payload.score))]
pub async fn set_item_score_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  path: web::Path<Uuid>,
  payload: web::Json<ScorePayload>,
) -> Result<HttpResponse, AppError> {
  let item_id = path.into_inner();
  app_state.scores.set(item_id, payload.score);
  info!(%item_id, "Sustainability score recorded.");
  Ok(HttpResponse::NoContent().finish())
}
