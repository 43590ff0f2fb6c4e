// server/src/models/order.rs

use super::parse_column;
use chrono::{DateTime, Utc};
use marketplace_commit::models::{DeliveryMethod, ItemKind, Order, OrderItem};
use marketplace_commit::PaymentProviderKind;
use sqlx::FromRow;
use uuid::Uuid;

/// Column list shared by every query that reads [`OrderRow`]s.
pub const ORDER_COLUMNS: &str = "id, user_id, subtotal_cents, discount_cents, shipping_fee_cents, total_price_cents, \
   delivery_method, voucher_id_used, payment_ref, provider, points_awarded, ordered_at, shipped_at, delivered_at, \
   review_started_at, review_completed_at";

#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
  pub id: Uuid,
  pub user_id: Uuid,
  pub subtotal_cents: i64,
  pub discount_cents: i64,
  pub shipping_fee_cents: i64,
  pub total_price_cents: i64,
  pub delivery_method: String,
  pub voucher_id_used: Option<Uuid>,
  pub payment_ref: String,
  pub provider: String,
  pub points_awarded: i64,
  pub ordered_at: DateTime<Utc>,
  pub shipped_at: Option<DateTime<Utc>>,
  pub delivered_at: Option<DateTime<Utc>>,
  pub review_started_at: Option<DateTime<Utc>>,
  pub review_completed_at: Option<DateTime<Utc>>,
}

impl OrderRow {
  pub fn into_order(self) -> anyhow::Result<Order> {
    Ok(Order {
      id: self.id,
      user_id: self.user_id,
      subtotal_cents: self.subtotal_cents,
      discount_cents: self.discount_cents,
      shipping_fee_cents: self.shipping_fee_cents,
      total_price_cents: self.total_price_cents,
      delivery_method: parse_column::<DeliveryMethod>("orders.delivery_method", &self.delivery_method)?,
      voucher_id_used: self.voucher_id_used,
      payment_ref: self.payment_ref,
      provider: parse_column::<PaymentProviderKind>("orders.provider", &self.provider)?,
      points_awarded: self.points_awarded,
      ordered_at: self.ordered_at,
      shipped_at: self.shipped_at,
      delivered_at: self.delivered_at,
      review_started_at: self.review_started_at,
      review_completed_at: self.review_completed_at,
    })
  }
}

#[derive(Debug, Clone, FromRow)]
pub struct OrderItemRow {
  pub id: Uuid,
  pub order_id: Uuid,
  pub item_kind: String,
  pub source_item_id: Uuid,
  pub quantity: i32,
  pub price_at_purchase_cents: i64,
  pub seller_id: Option<Uuid>,
  pub variant_id: Option<Uuid>,
}

impl OrderItemRow {
  pub fn into_item(self) -> anyhow::Result<OrderItem> {
    let quantity = u32::try_from(self.quantity)
      .map_err(|_| anyhow::anyhow!("Order item {} has quantity {}", self.id, self.quantity))?;
    Ok(OrderItem {
      id: self.id,
      order_id: self.order_id,
      item_kind: parse_column::<ItemKind>("order_items.item_kind", &self.item_kind)?,
      source_item_id: self.source_item_id,
      quantity,
      price_at_purchase_cents: self.price_at_purchase_cents,
      seller_id: self.seller_id,
      variant_id: self.variant_id,
    })
  }
}
