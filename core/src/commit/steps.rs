// core/src/commit/steps.rs

//! The steps of an order commit. All of them run inside the same unit of
//! work, in the order `OrderCommitter` calls them. The order row is written
//! before the voucher is consumed, since the voucher points at it.

use crate::commit::context::{CommitCtx, CommitRequest};
use crate::error::{CommitError, CommitResult};
use crate::inventory;
use crate::loyalty;
use crate::models::{ItemKind, Order, OrderItem};
use crate::pricing::{self, PricingPolicy};
use crate::store::StoreTx;
use crate::voucher_guard;
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Finds an order already committed for the payment. Holds the payment key
/// lock for the rest of the unit of work either way.
#[instrument(name = "commit_step::check_idempotency", skip_all, fields(payment = %ctx.request.payment_key()))]
pub async fn check_idempotency(
  ctx: &CommitCtx,
  tx: &mut dyn StoreTx,
) -> CommitResult<Option<(Order, Vec<OrderItem>)>> {
  let Some(order) = tx.find_order_for_payment(&ctx.request.payment_key()).await? else {
    return Ok(None);
  };
  ensure_order_owner(&order, &ctx.request)?;
  info!(order_id = %order.id, "Payment already committed, returning existing order.");
  let items = tx.order_items(order.id).await?;
  Ok(Some((order, items)))
}

/// An order found by payment key is only handed back to the user who placed it.
pub fn ensure_order_owner(order: &Order, request: &CommitRequest) -> CommitResult<()> {
  if order.user_id == request.user_id {
    return Ok(());
  }
  warn!(order_id = %order.id, "Payment key belongs to another user's order.");
  Err(CommitError::PaymentNotOwned {
    payment_ref: request.payment_ref.clone(),
    user_id: request.user_id,
  })
}

/// Re-prices the cart from stored prices and checks it against both the
/// client-declared total and the amount the provider actually captured.
#[instrument(name = "commit_step::reprice", skip_all)]
pub async fn reprice(ctx: &mut CommitCtx, tx: &mut dyn StoreTx, policy: &PricingPolicy) -> CommitResult<()> {
  ctx.priced = inventory::price_lines(tx, &ctx.request.lines).await?;

  let voucher = match ctx.request.voucher_id {
    Some(user_voucher_id) => Some(voucher_guard::peek(tx, ctx.request.user_id, user_voucher_id).await?),
    None => None,
  };
  let quote = pricing::quote(
    &ctx.priced,
    ctx.request.delivery_method,
    voucher.as_ref().map(|(owned, voucher)| (owned, voucher)),
    policy,
  );

  if let Some(declared) = ctx.request.declared_total_cents {
    pricing::ensure_matches(declared, quote.total_cents, policy.price_tolerance_cents)?;
  }
  if let Err(err) = pricing::ensure_matches(
    ctx.confirmation.amount_cents,
    quote.total_cents,
    policy.price_tolerance_cents,
  ) {
    warn!(
      paid_cents = ctx.confirmation.amount_cents,
      computed_cents = quote.total_cents,
      "Captured amount does not match server total."
    );
    return Err(err);
  }

  info!(total_cents = quote.total_cents, discount_cents = quote.discount_cents, "Cart re-priced.");
  ctx.quote = Some(quote);
  Ok(())
}

#[instrument(name = "commit_step::reserve_inventory", skip_all)]
pub async fn reserve_inventory(ctx: &mut CommitCtx, tx: &mut dyn StoreTx) -> CommitResult<()> {
  let token = inventory::reserve(tx, &ctx.priced).await?;
  ctx.reservation = Some(token);
  Ok(())
}

#[instrument(name = "commit_step::insert_order", skip_all, fields(order_id = %ctx.order_id))]
pub async fn insert_order(ctx: &mut CommitCtx, tx: &mut dyn StoreTx) -> CommitResult<()> {
  let quote = ctx
    .quote
    .ok_or_else(|| CommitError::Validation("Order cannot be written before it is priced.".to_string()))?;

  let order = Order {
    id: ctx.order_id,
    user_id: ctx.request.user_id,
    subtotal_cents: quote.subtotal_cents,
    discount_cents: quote.discount_cents,
    shipping_fee_cents: quote.shipping_fee_cents,
    total_price_cents: quote.total_cents,
    delivery_method: ctx.request.delivery_method,
    voucher_id_used: ctx.request.voucher_id,
    payment_ref: ctx.request.payment_ref.clone(),
    provider: ctx.request.provider,
    points_awarded: ctx.loyalty_points,
    ordered_at: Utc::now(),
    shipped_at: None,
    delivered_at: None,
    review_started_at: None,
    review_completed_at: None,
  };
  let items: Vec<OrderItem> = ctx
    .priced
    .iter()
    .map(|line| OrderItem {
      id: Uuid::new_v4(),
      order_id: order.id,
      item_kind: line.item_kind,
      source_item_id: line.source_item_id,
      quantity: line.quantity,
      price_at_purchase_cents: line.unit_price_cents,
      seller_id: line.seller_id,
      variant_id: (line.item_kind == ItemKind::ShopVariant).then_some(line.item_id),
    })
    .collect();

  tx.insert_order(&order, &items).await?;
  ctx.created = Some((order, items));
  Ok(())
}

/// Consumes the voucher for the order written by [`insert_order`]. On failure
/// the inventory reservation is released before the error is returned.
#[instrument(name = "commit_step::consume_voucher", skip_all)]
pub async fn consume_voucher(ctx: &mut CommitCtx, tx: &mut dyn StoreTx) -> CommitResult<()> {
  let Some(user_voucher_id) = ctx.request.voucher_id else {
    return Ok(());
  };
  match voucher_guard::consume(tx, ctx.request.user_id, user_voucher_id, ctx.order_id).await {
    Ok(token) => {
      ctx.consumption = Some(token);
      Ok(())
    }
    Err(err) => {
      if let Some(reservation) = ctx.reservation.as_mut() {
        inventory::release_after_failure(tx, reservation, &err).await;
      }
      Err(err)
    }
  }
}

#[instrument(name = "commit_step::accrue_loyalty", skip_all, fields(points = ctx.loyalty_points))]
pub async fn accrue_loyalty(ctx: &mut CommitCtx, tx: &mut dyn StoreTx) -> CommitResult<()> {
  let balance = loyalty::accrue(tx, ctx.request.user_id, ctx.loyalty_points).await?;
  info!(balance, "Loyalty points credited.");
  Ok(())
}
