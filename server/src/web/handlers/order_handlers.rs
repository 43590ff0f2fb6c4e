// server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use marketplace_commit::ReviewSubmission;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[instrument(name = "handler::list_orders", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.account.orders(auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::get_order", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let details = app_state
    .account
    .order_details(auth_user.user_id, path.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(json!({
    "order": details.order,
    "stage": details.order.stage(),
    "items": details.items,
  })))
}

#[instrument(
    name = "handler::submit_review",
    skip(app_state, auth_user, payload),
    fields(user_id = %auth_user.user_id)
)]
pub async fn submit_review_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
  payload: web::Json<ReviewSubmission>,
) -> Result<HttpResponse, AppError> {
  let outcome = app_state
    .fulfillment
    .submit_review(path.into_inner(), auth_user.user_id, payload.into_inner())
    .await?;
  Ok(HttpResponse::Created().json(json!({
    "review": outcome.review,
    "stage": outcome.order.stage(),
    "review_completed": outcome.completed,
  })))
}
