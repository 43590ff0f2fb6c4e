// server/src/web/handlers/voucher_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct RedeemPayload {
  pub voucher_id: Uuid,
}

#[derive(Deserialize, Debug)]
pub struct TogglePayload {
  pub is_active: bool,
}

pub async fn voucher_catalog_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.account.voucher_catalog().await?))
}

#[instrument(name = "handler::my_vouchers", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn my_vouchers_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.account.my_vouchers(auth_user.user_id).await?))
}

#[instrument(
    name = "handler::redeem_voucher",
    skip(app_state, auth_user, payload),
    fields(user_id = %auth_user.user_id, voucher_id = %payload.voucher_id)
)]
pub async fn redeem_voucher_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<RedeemPayload>,
) -> Result<HttpResponse, AppError> {
  let owned = app_state
    .account
    .redeem_voucher(auth_user.user_id, payload.voucher_id)
    .await?;
  info!(user_voucher_id = %owned.id, "Voucher redeemed.");
  Ok(HttpResponse::Created().json(owned))
}

#[instrument(name = "handler::toggle_voucher", skip(app_state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn toggle_voucher_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
  payload: web::Json<TogglePayload>,
) -> Result<HttpResponse, AppError> {
  let owned = app_state
    .account
    .set_voucher_active(auth_user.user_id, path.into_inner(), payload.is_active)
    .await?;
  Ok(HttpResponse::Ok().json(owned))
}

pub async fn points_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let balance = app_state.account.points(auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "user_id": auth_user.user_id, "points": balance })))
}
