// core/src/checkout.rs

//! Checkout entry points: quote before payment, finalize the payment, commit.

use crate::commit::{CommitOutcome, CommitRequest, OrderCommitter};
use crate::error::CommitResult;
use crate::inventory;
use crate::models::{CartLine, DeliveryMethod, PricedLine};
use crate::payment::{
  PaymentConfirmation, PaymentGateways, PaymentHandshake, PaymentProviderKind, PaymentRequest, PAYER_METADATA_KEY,
};
use crate::pricing::{self, PriceQuote};
use crate::store::CommerceStore;
use crate::voucher_guard;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
  pub lines: Vec<CartLine>,
  pub delivery_method: DeliveryMethod,
  #[serde(default)]
  pub voucher_id: Option<Uuid>,
  /// When set, a payment is opened at this provider for the quoted total.
  #[serde(default)]
  pub provider: Option<PaymentProviderKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutQuote {
  pub quote: PriceQuote,
  pub lines: Vec<PricedLine>,
  pub currency: String,
  pub handshake: Option<PaymentHandshake>,
}

#[derive(Clone)]
pub struct CheckoutService {
  store: Arc<dyn CommerceStore>,
  gateways: PaymentGateways,
  committer: OrderCommitter,
  currency: String,
}

impl CheckoutService {
  pub fn new(
    store: Arc<dyn CommerceStore>,
    gateways: PaymentGateways,
    committer: OrderCommitter,
    currency: impl Into<String>,
  ) -> Self {
    Self {
      store,
      gateways,
      committer,
      currency: currency.into(),
    }
  }

  /// Prices a cart from stored prices and checks that it could be reserved
  /// right now. Nothing is held afterwards: the unit of work is rolled back
  /// before the provider is called.
  #[instrument(name = "checkout::quote", skip(self, request), fields(line_count = request.lines.len()))]
  pub async fn quote(&self, user_id: Uuid, request: QuoteRequest) -> CommitResult<CheckoutQuote> {
    let (lines, quote) = {
      let mut tx = self.store.begin().await?;
      let lines = inventory::price_lines(tx.as_mut(), &request.lines).await?;
      let voucher = match request.voucher_id {
        Some(user_voucher_id) => Some(voucher_guard::peek(tx.as_mut(), user_id, user_voucher_id).await?),
        None => None,
      };
      inventory::reserve(tx.as_mut(), &lines).await?;
      let quote = pricing::quote(
        &lines,
        request.delivery_method,
        voucher.as_ref().map(|(owned, voucher)| (owned, voucher)),
        self.committer.pricing(),
      );
      tx.rollback().await?;
      (lines, quote)
    };

    let handshake = match request.provider {
      Some(provider) if quote.total_cents > 0 => {
        let mut payment = PaymentRequest::new(quote.total_cents, self.currency.clone())
          .with_metadata(PAYER_METADATA_KEY, user_id)
          .with_metadata("delivery_method", request.delivery_method);
        if let Some(voucher_id) = request.voucher_id {
          payment = payment.with_metadata("voucher_id", voucher_id);
        }
        Some(self.gateways.begin(provider, &payment).await?)
      }
      _ => None,
    };

    info!(total_cents = quote.total_cents, "Checkout quoted.");
    Ok(CheckoutQuote {
      quote,
      lines,
      currency: self.currency.clone(),
      handshake,
    })
  }

  /// Completes a client-approved payment (wallet capture, or card intent
  /// check) and returns the normalised `payment_ref` for the commit call.
  pub async fn finalize_payment(
    &self,
    provider: PaymentProviderKind,
    reference: &str,
  ) -> CommitResult<PaymentConfirmation> {
    Ok(self.gateways.finalize(provider, reference).await?)
  }

  pub async fn commit(&self, request: CommitRequest) -> CommitResult<CommitOutcome> {
    self.committer.commit(request).await
  }
}
