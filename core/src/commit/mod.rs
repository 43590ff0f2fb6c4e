// core/src/commit/mod.rs

//! Order commit: turns a confirmed payment and a cart into exactly one order.
//!
//! Payment confirmation and loyalty scoring happen before the unit of work
//! opens, so no row lock is held across a third-party call. Inside the unit
//! of work the steps run in a fixed order; any failure rolls everything back.
//! A payment only ever commits, or replays, an order of the user who paid.

pub mod context;
pub mod steps;

pub use context::{CommitCtx, CommitDisposition, CommitOutcome, CommitRequest};

use crate::broadcast::{OrderEvent, StatusBroadcaster};
use crate::error::{CommitError, CommitResult};
use crate::inventory;
use crate::loyalty::{self, LoyaltyPolicy, SustainabilityScorer};
use crate::models::{Order, OrderDetails, OrderItem};
use crate::payment::{PaymentConfirmation, PaymentGateways};
use crate::pricing::PricingPolicy;
use crate::store::{CommerceStore, StoreTx};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};

/// Collaborator that sends the buyer a receipt after a new order is committed.
#[async_trait]
pub trait ReceiptSender: Send + Sync {
  async fn send_receipt(&self, details: &OrderDetails) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct OrderCommitter {
  store: Arc<dyn CommerceStore>,
  gateways: PaymentGateways,
  scorer: Arc<dyn SustainabilityScorer>,
  broadcaster: StatusBroadcaster,
  receipts: Option<Arc<dyn ReceiptSender>>,
  pricing: PricingPolicy,
  loyalty: LoyaltyPolicy,
}

impl OrderCommitter {
  pub fn new(
    store: Arc<dyn CommerceStore>,
    gateways: PaymentGateways,
    scorer: Arc<dyn SustainabilityScorer>,
    broadcaster: StatusBroadcaster,
  ) -> Self {
    Self {
      store,
      gateways,
      scorer,
      broadcaster,
      receipts: None,
      pricing: PricingPolicy::default(),
      loyalty: LoyaltyPolicy::default(),
    }
  }

  pub fn with_receipts(mut self, receipts: Arc<dyn ReceiptSender>) -> Self {
    self.receipts = Some(receipts);
    self
  }

  pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
    self.pricing = pricing;
    self
  }

  pub fn with_loyalty(mut self, loyalty: LoyaltyPolicy) -> Self {
    self.loyalty = loyalty;
    self
  }

  pub fn pricing(&self) -> &PricingPolicy {
    &self.pricing
  }

  /// Commits an order for a confirmed payment.
  ///
  /// A second call for the same `(provider, payment_ref)` returns the order
  /// created by the first, unchanged, with [`CommitDisposition::Duplicate`].
  #[instrument(
    name = "order_commit",
    skip(self, request),
    fields(user_id = %request.user_id, payment = %request.payment_key())
  )]
  pub async fn commit(&self, request: CommitRequest) -> CommitResult<CommitOutcome> {
    inventory::validate_lines(&request.lines)?;

    if let Some(outcome) = self.existing_order(&request).await? {
      return Ok(outcome);
    }

    let confirmation = self
      .gateways
      .confirm(request.provider, &request.payment_ref)
      .await?;
    ensure_payer(&request, &confirmation)?;
    let points = loyalty::points_for(self.scorer.as_ref(), &request.lines, &self.loyalty).await;

    let mut ctx = CommitCtx::new(request, confirmation, points);
    let mut tx = self.store.begin().await?;
    match self.run_steps(&mut ctx, tx.as_mut()).await {
      Ok(None) => {}
      Ok(Some((order, items))) => {
        tx.rollback().await?;
        return Ok(duplicate(order, items));
      }
      Err(err) => {
        if matches!(
          err,
          CommitError::InsufficientStock { .. }
            | CommitError::ListingUnavailable { .. }
            | CommitError::VoucherAlreadyUsed { .. }
        ) {
          // The money is taken; an external compensation run refunds it by payment_ref.
          error!(
            error = %err,
            code = err.code(),
            payment_ref = %ctx.request.payment_ref,
            amount_cents = ctx.confirmation.amount_cents,
            "Payment confirmed but order not committed; needs compensation."
          );
        } else {
          warn!(error = %err, code = err.code(), "Commit aborted, rolling back.");
        }
        if let Err(rollback_err) = tx.rollback().await {
          error!(error = %rollback_err, "Rollback failed.");
        }
        return Err(err);
      }
    }
    tx.commit().await?;
    if let Some(reservation) = ctx.reservation.as_mut() {
      reservation.commit();
    }

    let (order, items) = ctx
      .created
      .take()
      .ok_or_else(|| anyhow::anyhow!("commit finished without an order"))?;
    info!(order_id = %order.id, total_cents = order.total_price_cents, "Order committed.");

    self.broadcaster.publish(OrderEvent::status(&order));
    self.send_receipt(OrderDetails {
      order: order.clone(),
      items: items.clone(),
    });

    Ok(CommitOutcome {
      order,
      items,
      disposition: CommitDisposition::Created,
    })
  }

  /// Runs the steps of a new commit. Returns the existing order instead when
  /// a concurrent commit of the same payment won the race.
  async fn run_steps(
    &self,
    ctx: &mut CommitCtx,
    tx: &mut dyn StoreTx,
  ) -> CommitResult<Option<(Order, Vec<OrderItem>)>> {
    if let Some(existing) = steps::check_idempotency(ctx, tx).await? {
      return Ok(Some(existing));
    }
    steps::reprice(ctx, tx, &self.pricing).await?;
    steps::reserve_inventory(ctx, tx).await?;
    steps::insert_order(ctx, tx).await?;
    steps::consume_voucher(ctx, tx).await?;
    steps::accrue_loyalty(ctx, tx).await?;
    Ok(None)
  }

  /// Looks for an order already committed for this payment, without calling
  /// the provider.
  async fn existing_order(&self, request: &CommitRequest) -> CommitResult<Option<CommitOutcome>> {
    let mut tx = self.store.begin().await?;
    let found = match tx.find_order_for_payment(&request.payment_key()).await? {
      Some(order) => match steps::ensure_order_owner(&order, request) {
        Ok(()) => {
          let items = tx.order_items(order.id).await?;
          Some(duplicate(order, items))
        }
        Err(err) => {
          tx.rollback().await?;
          return Err(err);
        }
      },
      None => None,
    };
    tx.rollback().await?;
    if found.is_some() {
      info!("Duplicate commit for an already committed payment.");
    }
    Ok(found)
  }

  fn send_receipt(&self, details: OrderDetails) {
    let Some(receipts) = self.receipts.clone() else {
      return;
    };
    let order_id = details.order.id;
    tokio::spawn(
      async move {
        if let Err(err) = receipts.send_receipt(&details).await {
          warn!(error = %err, "Receipt could not be sent.");
        }
      }
      .instrument(tracing::info_span!("send_receipt", %order_id)),
    );
  }
}

/// The provider must report the committing user as the payer. A payment with
/// no recorded payer was not opened by a checkout and is refused too.
fn ensure_payer(request: &CommitRequest, confirmation: &PaymentConfirmation) -> CommitResult<()> {
  if confirmation.payer_id == Some(request.user_id) {
    return Ok(());
  }
  warn!(payer_id = ?confirmation.payer_id, "Payment was made by a different user.");
  Err(CommitError::PaymentNotOwned {
    payment_ref: request.payment_ref.clone(),
    user_id: request.user_id,
  })
}

fn duplicate(order: Order, items: Vec<OrderItem>) -> CommitOutcome {
  CommitOutcome {
    order,
    items,
    disposition: CommitDisposition::Duplicate,
  }
}
