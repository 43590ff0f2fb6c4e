// core/src/store/memory.rs

//! In-process [`CommerceStore`].
//!
//! A transaction holds the single database mutex for its whole lifetime and
//! works on a private copy of the tables, which is written back on commit.
//! That makes every unit of work serializable, which trivially satisfies the
//! row-locking contract of [`StoreTx`]. Intended for tests and local runs.

use crate::error::{CommitError, CommitResult};
use crate::models::{
  Listing, ListingStatus, Order, OrderItem, PaymentKey, Review, ShopVariant, UserVoucher, Voucher,
};
use crate::store::{CommerceStore, StoreTx};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Tables {
  variants: HashMap<Uuid, ShopVariant>,
  listings: HashMap<Uuid, Listing>,
  vouchers: HashMap<Uuid, Voucher>,
  user_vouchers: HashMap<Uuid, UserVoucher>,
  points: HashMap<Uuid, i64>,
  orders: HashMap<Uuid, Order>,
  order_items: HashMap<Uuid, Vec<OrderItem>>,
  payment_index: HashMap<PaymentKey, Uuid>,
  reviews: HashMap<(Uuid, Uuid), Review>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn variant(&self, variant_id: Uuid) -> Option<ShopVariant> {
    self.tables.lock().await.variants.get(&variant_id).cloned()
  }

  pub async fn listing(&self, listing_id: Uuid) -> Option<Listing> {
    self.tables.lock().await.listings.get(&listing_id).cloned()
  }

  pub async fn user_voucher(&self, user_voucher_id: Uuid) -> Option<UserVoucher> {
    self.tables.lock().await.user_vouchers.get(&user_voucher_id).cloned()
  }

  pub async fn order_count(&self) -> usize {
    self.tables.lock().await.orders.len()
  }

  pub async fn order_item_count(&self) -> usize {
    self.tables.lock().await.order_items.values().map(Vec::len).sum()
  }

  pub async fn points_of(&self, user_id: Uuid) -> i64 {
    self.tables.lock().await.points.get(&user_id).copied().unwrap_or(0)
  }
}

#[async_trait]
impl CommerceStore for MemoryStore {
  async fn begin(&self) -> CommitResult<Box<dyn StoreTx>> {
    let guard = self.tables.clone().lock_owned().await;
    let working = guard.clone();
    trace!("memory transaction opened");
    Ok(Box::new(MemoryTx { guard, working }))
  }
}

pub struct MemoryTx {
  guard: OwnedMutexGuard<Tables>,
  working: Tables,
}

fn missing(what: &str, id: Uuid) -> CommitError {
  CommitError::store(anyhow!("{} {} does not exist", what, id))
}

#[async_trait]
impl StoreTx for MemoryTx {
  async fn find_order_for_payment(&mut self, key: &PaymentKey) -> CommitResult<Option<Order>> {
    Ok(
      self
        .working
        .payment_index
        .get(key)
        .and_then(|order_id| self.working.orders.get(order_id))
        .cloned(),
    )
  }

  async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> CommitResult<()> {
    let key = order.payment_key();
    if self.working.payment_index.contains_key(&key) {
      return Err(CommitError::store(anyhow!("payment key {} already has an order", key)));
    }
    if self.working.orders.contains_key(&order.id) {
      return Err(CommitError::store(anyhow!("order {} already exists", order.id)));
    }
    self.working.payment_index.insert(key, order.id);
    self.working.orders.insert(order.id, order.clone());
    self.working.order_items.insert(order.id, items.to_vec());
    Ok(())
  }

  async fn order(&mut self, order_id: Uuid) -> CommitResult<Option<Order>> {
    Ok(self.working.orders.get(&order_id).cloned())
  }

  async fn lock_order(&mut self, order_id: Uuid) -> CommitResult<Option<Order>> {
    Ok(self.working.orders.get(&order_id).cloned())
  }

  async fn update_order_timeline(&mut self, order: &Order) -> CommitResult<()> {
    let stored = self
      .working
      .orders
      .get_mut(&order.id)
      .ok_or_else(|| missing("order", order.id))?;
    stored.shipped_at = order.shipped_at;
    stored.delivered_at = order.delivered_at;
    stored.review_started_at = order.review_started_at;
    stored.review_completed_at = order.review_completed_at;
    Ok(())
  }

  async fn order_items(&mut self, order_id: Uuid) -> CommitResult<Vec<OrderItem>> {
    Ok(self.working.order_items.get(&order_id).cloned().unwrap_or_default())
  }

  async fn orders_for_user(&mut self, user_id: Uuid) -> CommitResult<Vec<Order>> {
    let mut orders: Vec<Order> = self
      .working
      .orders
      .values()
      .filter(|o| o.user_id == user_id)
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.ordered_at.cmp(&a.ordered_at));
    Ok(orders)
  }

  async fn lock_variant(&mut self, variant_id: Uuid) -> CommitResult<Option<ShopVariant>> {
    Ok(self.working.variants.get(&variant_id).cloned())
  }

  async fn set_variant_stock(&mut self, variant_id: Uuid, stock_amt: i64) -> CommitResult<()> {
    if stock_amt < 0 {
      return Err(CommitError::store(anyhow!(
        "stock of variant {} cannot go negative ({})",
        variant_id,
        stock_amt
      )));
    }
    let variant = self
      .working
      .variants
      .get_mut(&variant_id)
      .ok_or_else(|| missing("variant", variant_id))?;
    variant.stock_amt = stock_amt;
    Ok(())
  }

  async fn lock_listing(&mut self, listing_id: Uuid) -> CommitResult<Option<Listing>> {
    Ok(self.working.listings.get(&listing_id).cloned())
  }

  async fn set_listing_status(&mut self, listing_id: Uuid, status: ListingStatus) -> CommitResult<()> {
    let listing = self
      .working
      .listings
      .get_mut(&listing_id)
      .ok_or_else(|| missing("listing", listing_id))?;
    listing.status = status;
    Ok(())
  }

  async fn upsert_variant(&mut self, variant: &ShopVariant) -> CommitResult<()> {
    self.working.variants.insert(variant.id, variant.clone());
    Ok(())
  }

  async fn upsert_listing(&mut self, listing: &Listing) -> CommitResult<()> {
    self.working.listings.insert(listing.id, listing.clone());
    Ok(())
  }

  async fn voucher(&mut self, voucher_id: Uuid) -> CommitResult<Option<Voucher>> {
    Ok(self.working.vouchers.get(&voucher_id).cloned())
  }

  async fn vouchers(&mut self) -> CommitResult<Vec<Voucher>> {
    let mut vouchers: Vec<Voucher> = self.working.vouchers.values().cloned().collect();
    vouchers.sort_by(|a, b| a.points_cost.cmp(&b.points_cost).then_with(|| a.code.cmp(&b.code)));
    Ok(vouchers)
  }

  async fn upsert_voucher(&mut self, voucher: &Voucher) -> CommitResult<()> {
    self.working.vouchers.insert(voucher.id, voucher.clone());
    Ok(())
  }

  async fn lock_user_voucher(&mut self, user_voucher_id: Uuid) -> CommitResult<Option<UserVoucher>> {
    Ok(self.working.user_vouchers.get(&user_voucher_id).cloned())
  }

  async fn save_user_voucher(&mut self, user_voucher: &UserVoucher) -> CommitResult<()> {
    // Same reference check as the SQL foreign key.
    if let Some(order_id) = user_voucher.consumed_by_order {
      if !self.working.orders.contains_key(&order_id) {
        return Err(CommitError::store(anyhow!(
          "user voucher {} references unknown order {}",
          user_voucher.id,
          order_id
        )));
      }
    }
    self
      .working
      .user_vouchers
      .insert(user_voucher.id, user_voucher.clone());
    Ok(())
  }

  async fn user_vouchers(&mut self, user_id: Uuid) -> CommitResult<Vec<UserVoucher>> {
    let mut owned: Vec<UserVoucher> = self
      .working
      .user_vouchers
      .values()
      .filter(|uv| uv.user_id == user_id)
      .cloned()
      .collect();
    owned.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at));
    Ok(owned)
  }

  async fn points(&mut self, user_id: Uuid) -> CommitResult<i64> {
    Ok(self.working.points.get(&user_id).copied().unwrap_or(0))
  }

  async fn lock_points(&mut self, user_id: Uuid) -> CommitResult<i64> {
    Ok(*self.working.points.entry(user_id).or_insert(0))
  }

  async fn set_points(&mut self, user_id: Uuid, balance: i64) -> CommitResult<()> {
    self.working.points.insert(user_id, balance);
    Ok(())
  }

  async fn insert_review(&mut self, review: &Review) -> CommitResult<bool> {
    let key = (review.order_id, review.order_item_id);
    if self.working.reviews.contains_key(&key) {
      return Ok(false);
    }
    self.working.reviews.insert(key, review.clone());
    Ok(true)
  }

  async fn reviewed_items(&mut self, order_id: Uuid) -> CommitResult<Vec<Uuid>> {
    Ok(
      self
        .working
        .reviews
        .keys()
        .filter(|(o, _)| *o == order_id)
        .map(|(_, item)| *item)
        .collect(),
    )
  }

  async fn commit(self: Box<Self>) -> CommitResult<()> {
    let MemoryTx { mut guard, working } = *self;
    *guard = working;
    trace!("memory transaction committed");
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> CommitResult<()> {
    trace!("memory transaction rolled back");
    Ok(())
  }
}
