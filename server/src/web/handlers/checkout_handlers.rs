// server/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use marketplace_commit::models::{CartLine, DeliveryMethod};
use marketplace_commit::{CommitRequest, PaymentProviderKind, QuoteRequest};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct CapturePayload {
  #[serde(default = "default_capture_provider")]
  pub provider: PaymentProviderKind,
  pub provider_order_id: String,
}

fn default_capture_provider() -> PaymentProviderKind {
  PaymentProviderKind::Wallet
}

#[derive(Deserialize, Debug)]
pub struct CommitPayload {
  pub lines: Vec<CartLine>,
  pub delivery_method: DeliveryMethod,
  #[serde(default)]
  pub voucher_id: Option<Uuid>,
  #[serde(default)]
  pub declared_total_cents: Option<i64>,
  pub payment_ref: String,
  pub provider: PaymentProviderKind,
}

#[instrument(
    name = "handler::quote",
    skip(app_state, auth_user, payload),
    fields(user_id = %auth_user.user_id)
)]
pub async fn quote_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<QuoteRequest>,
) -> Result<HttpResponse, AppError> {
  let quote = app_state.checkout.quote(auth_user.user_id, payload.into_inner()).await?;
  Ok(HttpResponse::Ok().json(quote))
}

#[instrument(
    name = "handler::capture",
    skip(app_state, auth_user, payload),
    fields(user_id = %auth_user.user_id, provider_order_id = %payload.provider_order_id)
)]
pub async fn capture_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<CapturePayload>,
) -> Result<HttpResponse, AppError> {
  if payload.provider_order_id.trim().is_empty() {
    return Err(AppError::Validation("provider_order_id is required.".to_string()));
  }
  let confirmation = app_state
    .checkout
    .finalize_payment(payload.provider, payload.provider_order_id.trim())
    .await?;
  info!(payment_ref = %confirmation.payment_ref, "Payment finalized.");
  Ok(HttpResponse::Ok().json(json!({
    "provider": confirmation.provider,
    "payment_ref": confirmation.payment_ref,
    "amount_cents": confirmation.amount_cents,
    "currency": confirmation.currency,
  })))
}

#[instrument(
    name = "handler::commit",
    skip(app_state, auth_user, payload),
    fields(user_id = %auth_user.user_id, payment_ref = %payload.payment_ref)
)]
pub async fn commit_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<CommitPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let request = CommitRequest {
    user_id: auth_user.user_id,
    lines: payload.lines,
    delivery_method: payload.delivery_method,
    voucher_id: payload.voucher_id,
    declared_total_cents: payload.declared_total_cents,
    payment_ref: payload.payment_ref,
    provider: payload.provider,
  };

  let outcome = app_state.checkout.commit(request).await?;
  info!(
    order_id = %outcome.order.id,
    duplicate = outcome.is_duplicate(),
    "Commit request answered."
  );
  if outcome.is_duplicate() {
    Ok(HttpResponse::Ok().json(outcome))
  } else {
    Ok(HttpResponse::Created().json(outcome))
  }
}
