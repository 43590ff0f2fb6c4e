// server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use marketplace_commit::{CommitError, PaymentError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error(transparent)]
  Commit(#[from] CommitError),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<PaymentError> for AppError {
  fn from(err: PaymentError) -> Self {
    AppError::Commit(CommitError::Payment(err))
  }
}

// Handlers and startup code may bubble up anyhow errors.
impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(err) => AppError::Internal(err.to_string()),
    }
  }
}

impl AppError {
  pub fn code(&self) -> &'static str {
    match self {
      AppError::Validation(_) => "VALIDATION",
      AppError::Auth(_) => "UNAUTHORIZED",
      AppError::NotFound(_) => "NOT_FOUND",
      AppError::Config(_) => "CONFIGURATION",
      AppError::Sqlx(_) => "STORAGE",
      AppError::Commit(err) => err.code(),
      AppError::Internal(_) => "INTERNAL",
    }
  }
}

fn commit_status(err: &CommitError) -> StatusCode {
  match err {
    CommitError::InsufficientStock { .. }
    | CommitError::ListingUnavailable { .. }
    | CommitError::VoucherAlreadyUsed { .. }
    | CommitError::VoucherNotOwned { .. }
    | CommitError::PaymentNotOwned { .. }
    | CommitError::InvalidTransition { .. }
    | CommitError::ReviewRejected { .. }
    | CommitError::InsufficientPoints { .. } => StatusCode::CONFLICT,
    CommitError::PriceMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    CommitError::Payment(PaymentError::Declined { .. }) => StatusCode::PAYMENT_REQUIRED,
    CommitError::Payment(PaymentError::ProviderUnavailable { .. })
    | CommitError::Payment(PaymentError::NotConfigured { .. }) => StatusCode::SERVICE_UNAVAILABLE,
    CommitError::Payment(PaymentError::Indeterminate { .. }) => StatusCode::BAD_GATEWAY,
    CommitError::NotFound(_) => StatusCode::NOT_FOUND,
    CommitError::Validation(_) => StatusCode::BAD_REQUEST,
    CommitError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Commit(err) => commit_status(err),
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, code = self.code(), "Responding with error");
    } else {
      tracing::warn!(application_error = %self, code = self.code(), "Responding with error");
    }
    // Storage and configuration details stay in the logs.
    let message = match self {
      AppError::Sqlx(_) | AppError::Commit(CommitError::Store { .. }) => "Database operation failed".to_string(),
      AppError::Config(_) => "Configuration issue".to_string(),
      other => other.to_string(),
    };
    HttpResponse::build(status).json(json!({ "error": message, "code": self.code() }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use marketplace_commit::models::ListingStatus;
  use marketplace_commit::PaymentProviderKind;
  use uuid::Uuid;

  #[test]
  fn commit_failures_map_to_http_statuses() {
    let cases: Vec<(AppError, StatusCode, &str)> = vec![
      (
        CommitError::InsufficientStock {
          variant_id: Uuid::nil(),
          requested: 2,
          available: 1,
        }
        .into(),
        StatusCode::CONFLICT,
        "INSUFFICIENT_STOCK",
      ),
      (
        CommitError::ListingUnavailable {
          listing_id: Uuid::nil(),
          status: ListingStatus::Sold,
        }
        .into(),
        StatusCode::CONFLICT,
        "LISTING_UNAVAILABLE",
      ),
      (
        CommitError::PaymentNotOwned {
          payment_ref: "pi_1".to_string(),
          user_id: Uuid::nil(),
        }
        .into(),
        StatusCode::CONFLICT,
        "PAYMENT_NOT_OWNED",
      ),
      (
        CommitError::PriceMismatch {
          declared_cents: 1,
          computed_cents: 2,
        }
        .into(),
        StatusCode::UNPROCESSABLE_ENTITY,
        "PRICE_MISMATCH",
      ),
      (
        PaymentError::Declined {
          provider: PaymentProviderKind::Card,
          reason: "insufficient funds".to_string(),
        }
        .into(),
        StatusCode::PAYMENT_REQUIRED,
        "PAYMENT_DECLINED",
      ),
      (
        PaymentError::ProviderUnavailable {
          provider: PaymentProviderKind::Wallet,
          message: "timeout".to_string(),
        }
        .into(),
        StatusCode::SERVICE_UNAVAILABLE,
        "PROVIDER_UNAVAILABLE",
      ),
      (
        PaymentError::Indeterminate {
          provider: PaymentProviderKind::Wallet,
          reference: "ORDER-1".to_string(),
          message: "lost".to_string(),
        }
        .into(),
        StatusCode::BAD_GATEWAY,
        "PAYMENT_INDETERMINATE",
      ),
      (AppError::Auth("missing".to_string()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
    ];

    for (err, status, code) in cases {
      assert_eq!(err.status_code(), status, "{}", err);
      assert_eq!(err.code(), code);
      assert_eq!(err.error_response().status(), status);
    }
  }

  #[test]
  fn storage_details_are_not_exposed() {
    let err: AppError = CommitError::store(anyhow::anyhow!("connection reset by peer")).into();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.code(), "STORAGE");
  }
}
