// core/src/payment/mod.rs

//! Payment provider capability.
//!
//! Both providers are driven through [`PaymentProvider`]; callers only ever
//! see a [`PaymentConfirmation`] carrying a provider-scoped `payment_ref`.
//! Inventory and vouchers are unknown here.

pub mod gateways;
pub mod mock;

use crate::error::PaymentResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use gateways::PaymentGateways;
pub use mock::{MockCardProvider, MockFault, MockWalletProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProviderKind {
  /// Direct card intent flow.
  Card,
  /// Redirect / wallet order-capture flow.
  Wallet,
}

impl PaymentProviderKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentProviderKind::Card => "card",
      PaymentProviderKind::Wallet => "wallet",
    }
  }
}

impl fmt::Display for PaymentProviderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentProviderKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "card" | "creditcard" | "credit_card" => Ok(PaymentProviderKind::Card),
      "wallet" | "paypal" => Ok(PaymentProviderKind::Wallet),
      other => Err(format!("unknown payment provider '{}'", other)),
    }
  }
}

/// Metadata key under which a payment records the user who opened it.
pub const PAYER_METADATA_KEY: &str = "user_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
  pub amount_cents: i64,
  pub currency: String,
  #[serde(default)]
  pub metadata: BTreeMap<String, String>,
}

impl PaymentRequest {
  pub fn new(amount_cents: i64, currency: impl Into<String>) -> Self {
    Self {
      amount_cents,
      currency: currency.into(),
      metadata: BTreeMap::new(),
    }
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
    self.metadata.insert(key.into(), value.to_string());
    self
  }

  pub fn payer_id(&self) -> Option<Uuid> {
    parse_payer(self.metadata.get(PAYER_METADATA_KEY).map(String::as_str))
  }
}

/// Reads a payer id echoed back by a provider. Anything that is not a user id
/// counts as no payer.
pub fn parse_payer(raw: Option<&str>) -> Option<Uuid> {
  raw.and_then(|value| Uuid::parse_str(value.trim()).ok())
}

/// What the client needs to approve a payment out-of-band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHandshake {
  pub provider: PaymentProviderKind,
  /// Intent id (card) or provider order id (wallet).
  pub reference: String,
  /// Client secret of a card intent.
  pub client_token: Option<String>,
  /// Approval link of a wallet order.
  pub approve_url: Option<String>,
}

/// Normalised "payment confirmed" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
  pub provider: PaymentProviderKind,
  pub payment_ref: String,
  pub amount_cents: i64,
  pub currency: String,
  /// User recorded on the payment when it was opened.
  #[serde(default)]
  pub payer_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
  Succeeded(PaymentConfirmation),
  /// Created but not yet approved or captured.
  Pending,
  Failed { reason: String },
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
  fn kind(&self) -> PaymentProviderKind;

  /// Opens a payment: a card intent, or a wallet order awaiting approval.
  async fn begin(&self, request: &PaymentRequest) -> PaymentResult<PaymentHandshake>;

  /// Completes a client-approved payment. For cards this checks that the
  /// intent succeeded; for wallets it captures the order. Must be safe to call
  /// again for a reference that was already finalized.
  async fn finalize(&self, reference: &str) -> PaymentResult<PaymentConfirmation>;

  /// Status of the payment opened under a handshake `reference`.
  async fn lookup(&self, reference: &str) -> PaymentResult<PaymentStatus>;

  /// Status of a finalized payment by its `payment_ref`.
  async fn verify(&self, payment_ref: &str) -> PaymentResult<PaymentStatus>;
}
