// core/src/models/order.rs

use crate::models::cart::{DeliveryMethod, ItemKind};
use crate::payment::PaymentProviderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Fulfillment lifecycle, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FulfillmentStage {
  Ordered,
  Shipped,
  Delivered,
  ReviewStarted,
  ReviewCompleted,
}

impl FulfillmentStage {
  pub fn as_str(&self) -> &'static str {
    match self {
      FulfillmentStage::Ordered => "Ordered",
      FulfillmentStage::Shipped => "Shipped",
      FulfillmentStage::Delivered => "Delivered",
      FulfillmentStage::ReviewStarted => "ReviewStarted",
      FulfillmentStage::ReviewCompleted => "ReviewCompleted",
    }
  }
}

impl fmt::Display for FulfillmentStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Provider-scoped idempotency key of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentKey {
  pub provider: PaymentProviderKind,
  pub payment_ref: String,
}

impl PaymentKey {
  pub fn new(provider: PaymentProviderKind, payment_ref: impl Into<String>) -> Self {
    Self {
      provider,
      payment_ref: payment_ref.into(),
    }
  }
}

impl fmt::Display for PaymentKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.provider, self.payment_ref)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub subtotal_cents: i64,
  pub discount_cents: i64,
  pub shipping_fee_cents: i64,
  pub total_price_cents: i64,
  pub delivery_method: DeliveryMethod,
  /// The `UserVoucher` consumed by this order, if any.
  pub voucher_id_used: Option<Uuid>,
  pub payment_ref: String,
  pub provider: PaymentProviderKind,
  pub points_awarded: i64,
  pub ordered_at: DateTime<Utc>,
  pub shipped_at: Option<DateTime<Utc>>,
  pub delivered_at: Option<DateTime<Utc>>,
  pub review_started_at: Option<DateTime<Utc>>,
  pub review_completed_at: Option<DateTime<Utc>>,
}

impl Order {
  /// Furthest stage reached, derived from the timestamp fields.
  pub fn stage(&self) -> FulfillmentStage {
    if self.review_completed_at.is_some() {
      FulfillmentStage::ReviewCompleted
    } else if self.review_started_at.is_some() {
      FulfillmentStage::ReviewStarted
    } else if self.delivered_at.is_some() {
      FulfillmentStage::Delivered
    } else if self.shipped_at.is_some() {
      FulfillmentStage::Shipped
    } else {
      FulfillmentStage::Ordered
    }
  }

  pub fn payment_key(&self) -> PaymentKey {
    PaymentKey::new(self.provider, self.payment_ref.clone())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub item_kind: ItemKind,
  pub source_item_id: Uuid,
  pub quantity: u32,
  pub price_at_purchase_cents: i64,
  pub seller_id: Option<Uuid>,
  pub variant_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
  pub order: Order,
  pub items: Vec<OrderItem>,
}

/// A review as written by the review store. The engine only observes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
  pub order_id: Uuid,
  pub order_item_id: Uuid,
  pub user_id: Uuid,
  pub rating: u8,
  pub comment: String,
  pub submitted_at: DateTime<Utc>,
}
