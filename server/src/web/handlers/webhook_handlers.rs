// server/src/web/handlers/webhook_handlers.rs

//! Stand-in for the provider side of an out-of-band approval. Only mounted
//! in mock payment mode: it plays the buyer confirming a card intent or
//! approving a wallet order at the provider.

use actix_web::{web, HttpResponse};
use marketplace_commit::PaymentProviderKind;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;

#[instrument(name = "handler::mock_approval", skip(app_state))]
pub async fn mock_approval_handler(
  app_state: web::Data<AppState>,
  path: web::Path<(PaymentProviderKind, String)>,
) -> Result<HttpResponse, AppError> {
  let (provider, reference) = path.into_inner();
  let Some(mocks) = app_state.mocks.as_ref() else {
    return Err(AppError::NotFound("Mock payment providers are not enabled.".to_string()));
  };

  let approved = match provider {
    PaymentProviderKind::Card => mocks.card.approve(&reference),
    PaymentProviderKind::Wallet => mocks.wallet.approve(&reference),
  };
  if !approved {
    warn!("Mock approval for an unknown or already approved payment.");
    return Err(AppError::NotFound(format!(
      "No pending {} payment '{}'.",
      provider, reference
    )));
  }
  info!("Mock payment approved.");
  Ok(HttpResponse::Ok().json(serde_json::json!({ "approved": true, "reference": reference })))
}
