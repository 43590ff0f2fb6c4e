// core/src/error.rs
use crate::models::{FulfillmentStage, ListingStatus};
use crate::payment::PaymentProviderKind;
use anyhow::Error as AnyhowError;
use thiserror::Error;
use uuid::Uuid;

/// Normalised failure of a payment provider call.
#[derive(Debug, Error)]
pub enum PaymentError {
  /// Timeout or transport failure before the provider answered. Retryable.
  #[error("Payment provider '{provider}' unavailable: {message}")]
  ProviderUnavailable {
    provider: PaymentProviderKind,
    message: String,
  },

  /// The provider refused the payment. Terminal, never retried.
  #[error("Payment declined by '{provider}': {reason}")]
  Declined {
    provider: PaymentProviderKind,
    reason: String,
  },

  /// The provider may or may not have taken the money. Must be resolved by
  /// re-querying the provider before anything is retried.
  #[error("Payment outcome for '{reference}' at '{provider}' is indeterminate: {message}")]
  Indeterminate {
    provider: PaymentProviderKind,
    reference: String,
    message: String,
  },

  #[error("Payment provider '{provider}' is not configured")]
  NotConfigured { provider: PaymentProviderKind },
}

impl PaymentError {
  pub fn is_retryable(&self) -> bool {
    matches!(self, PaymentError::ProviderUnavailable { .. })
  }

  pub fn provider(&self) -> PaymentProviderKind {
    match self {
      PaymentError::ProviderUnavailable { provider, .. }
      | PaymentError::Declined { provider, .. }
      | PaymentError::Indeterminate { provider, .. }
      | PaymentError::NotConfigured { provider } => *provider,
    }
  }
}

#[derive(Debug, Error)]
pub enum CommitError {
  #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
  InsufficientStock {
    variant_id: Uuid,
    requested: u32,
    available: i64,
  },

  #[error("Listing {listing_id} is not available (status: {status})")]
  ListingUnavailable { listing_id: Uuid, status: ListingStatus },

  #[error("Voucher {user_voucher_id} has already been used or is inactive")]
  VoucherAlreadyUsed { user_voucher_id: Uuid },

  #[error("Voucher {user_voucher_id} is not owned by user {user_id}")]
  VoucherNotOwned { user_voucher_id: Uuid, user_id: Uuid },

  /// The payment was made by another user, or carries no payer at all.
  #[error("Payment {payment_ref} does not belong to user {user_id}")]
  PaymentNotOwned { payment_ref: String, user_id: Uuid },

  #[error("Price mismatch: declared {declared_cents} cents, server computed {computed_cents} cents")]
  PriceMismatch { declared_cents: i64, computed_cents: i64 },

  #[error(transparent)]
  Payment(#[from] PaymentError),

  #[error("Invalid transition for order {order_id}: cannot move from {current} to {requested}")]
  InvalidTransition {
    order_id: Uuid,
    current: FulfillmentStage,
    requested: FulfillmentStage,
  },

  #[error("User {user_id} has {balance} points, {required} required")]
  InsufficientPoints { user_id: Uuid, balance: i64, required: i64 },

  #[error("Review rejected for order {order_id}: {reason}")]
  ReviewRejected { order_id: Uuid, reason: String },

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Validation error: {0}")]
  Validation(String),

  #[error("Storage error: {source}")]
  Store {
    #[source]
    source: AnyhowError,
  },
}

impl CommitError {
  /// Stable machine-readable code, used on the wire.
  pub fn code(&self) -> &'static str {
    match self {
      CommitError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
      CommitError::ListingUnavailable { .. } => "LISTING_UNAVAILABLE",
      CommitError::VoucherAlreadyUsed { .. } => "VOUCHER_ALREADY_USED",
      CommitError::VoucherNotOwned { .. } => "VOUCHER_NOT_OWNED",
      CommitError::PaymentNotOwned { .. } => "PAYMENT_NOT_OWNED",
      CommitError::PriceMismatch { .. } => "PRICE_MISMATCH",
      CommitError::Payment(PaymentError::ProviderUnavailable { .. }) => "PROVIDER_UNAVAILABLE",
      CommitError::Payment(PaymentError::Declined { .. }) => "PAYMENT_DECLINED",
      CommitError::Payment(PaymentError::Indeterminate { .. }) => "PAYMENT_INDETERMINATE",
      CommitError::Payment(PaymentError::NotConfigured { .. }) => "PROVIDER_NOT_CONFIGURED",
      CommitError::InvalidTransition { .. } => "INVALID_TRANSITION",
      CommitError::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
      CommitError::ReviewRejected { .. } => "REVIEW_REJECTED",
      CommitError::NotFound(_) => "NOT_FOUND",
      CommitError::Validation(_) => "VALIDATION",
      CommitError::Store { .. } => "STORAGE",
    }
  }

  pub fn store(err: impl Into<AnyhowError>) -> Self {
    CommitError::Store { source: err.into() }
  }
}

// Storage backends and collaborators report through anyhow.
impl From<AnyhowError> for CommitError {
  fn from(err: AnyhowError) -> Self {
    CommitError::Store { source: err }
  }
}

pub type CommitResult<T, E = CommitError> = std::result::Result<T, E>;
pub type PaymentResult<T, E = PaymentError> = std::result::Result<T, E>;
