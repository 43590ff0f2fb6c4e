// core/src/commit/context.rs

use crate::inventory::ReservationToken;
use crate::models::{CartLine, DeliveryMethod, Order, OrderItem, PaymentKey, PricedLine};
use crate::payment::{PaymentConfirmation, PaymentProviderKind};
use crate::pricing::PriceQuote;
use crate::voucher_guard::ConsumptionToken;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input of a commit: what the buyer asked for and the payment that pays it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
  pub user_id: Uuid,
  pub lines: Vec<CartLine>,
  pub delivery_method: DeliveryMethod,
  /// `UserVoucher` to apply.
  #[serde(default)]
  pub voucher_id: Option<Uuid>,
  /// Total the client believes it paid, checked against the server total.
  #[serde(default)]
  pub declared_total_cents: Option<i64>,
  pub payment_ref: String,
  pub provider: PaymentProviderKind,
}

impl CommitRequest {
  pub fn payment_key(&self) -> PaymentKey {
    PaymentKey::new(self.provider, self.payment_ref.clone())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitDisposition {
  Created,
  /// An order already existed for this payment and was returned unchanged.
  Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
  pub order: Order,
  pub items: Vec<OrderItem>,
  pub disposition: CommitDisposition,
}

impl CommitOutcome {
  pub fn is_duplicate(&self) -> bool {
    self.disposition == CommitDisposition::Duplicate
  }
}

/// State threaded through the commit steps.
#[derive(Debug)]
pub struct CommitCtx {
  pub request: CommitRequest,
  pub order_id: Uuid,
  pub confirmation: PaymentConfirmation,
  pub loyalty_points: i64,
  pub priced: Vec<PricedLine>,
  pub quote: Option<PriceQuote>,
  pub reservation: Option<ReservationToken>,
  pub consumption: Option<ConsumptionToken>,
  pub created: Option<(Order, Vec<OrderItem>)>,
}

impl CommitCtx {
  pub fn new(request: CommitRequest, confirmation: PaymentConfirmation, loyalty_points: i64) -> Self {
    Self {
      request,
      order_id: Uuid::new_v4(),
      confirmation,
      loyalty_points,
      priced: Vec::new(),
      quote: None,
      reservation: None,
      consumption: None,
      created: None,
    }
  }
}
