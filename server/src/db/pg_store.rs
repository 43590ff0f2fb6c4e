// server/src/db/pg_store.rs

//! Postgres backend of the engine's storage seam.
//!
//! Each unit of work is one database transaction. Row locks are taken with
//! `SELECT ... FOR UPDATE`; the payment key is serialised with a
//! transaction-scoped advisory lock so two commits of the same payment never
//! overlap, and `UNIQUE (provider, payment_ref)` on `orders` backs it up.

use crate::models::order::ORDER_COLUMNS;
use crate::models::{ListingRow, OrderItemRow, OrderRow, UserVoucherRow, VariantRow, VoucherRow};
use async_trait::async_trait;
use marketplace_commit::models::{
  Listing, ListingStatus, Order, OrderItem, PaymentKey, Review, ShopVariant, UserVoucher, Voucher,
};
use marketplace_commit::{CommerceStore, CommitError, CommitResult, StoreTx};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

fn db(err: sqlx::Error) -> CommitError {
  CommitError::store(err)
}

#[derive(Debug, Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }
}

#[async_trait]
impl CommerceStore for PgStore {
  async fn begin(&self) -> CommitResult<Box<dyn StoreTx>> {
    let tx = self.pool.begin().await.map_err(db)?;
    Ok(Box::new(PgTx { tx }))
  }
}

pub struct PgTx {
  tx: Transaction<'static, Postgres>,
}

impl PgTx {
  async fn fetch_order(&mut self, order_id: Uuid, for_update: bool) -> CommitResult<Option<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE id = $1{}",
      ORDER_COLUMNS,
      if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(order_id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(db)?;
    Ok(row.map(OrderRow::into_order).transpose()?)
  }
}

#[async_trait]
impl StoreTx for PgTx {
  #[instrument(name = "pg_store::find_order_for_payment", skip(self), fields(payment = %key))]
  async fn find_order_for_payment(&mut self, key: &PaymentKey) -> CommitResult<Option<Order>> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
      .bind(key.to_string())
      .execute(&mut *self.tx)
      .await
      .map_err(db)?;
    let sql = format!("SELECT {} FROM orders WHERE provider = $1 AND payment_ref = $2", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(key.provider.as_str())
      .bind(&key.payment_ref)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(db)?;
    Ok(row.map(OrderRow::into_order).transpose()?)
  }

  async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> CommitResult<()> {
    sqlx::query(
      "INSERT INTO orders (id, user_id, subtotal_cents, discount_cents, shipping_fee_cents, total_price_cents, \
       delivery_method, voucher_id_used, payment_ref, provider, points_awarded, ordered_at, shipped_at, \
       delivered_at, review_started_at, review_completed_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(order.subtotal_cents)
    .bind(order.discount_cents)
    .bind(order.shipping_fee_cents)
    .bind(order.total_price_cents)
    .bind(order.delivery_method.as_str())
    .bind(order.voucher_id_used)
    .bind(&order.payment_ref)
    .bind(order.provider.as_str())
    .bind(order.points_awarded)
    .bind(order.ordered_at)
    .bind(order.shipped_at)
    .bind(order.delivered_at)
    .bind(order.review_started_at)
    .bind(order.review_completed_at)
    .execute(&mut *self.tx)
    .await
    .map_err(db)?;

    for (position, item) in items.iter().enumerate() {
      let quantity = i32::try_from(item.quantity)
        .map_err(|_| CommitError::Validation(format!("Quantity {} is out of range.", item.quantity)))?;
      sqlx::query(
        "INSERT INTO order_items (id, order_id, item_kind, source_item_id, quantity, price_at_purchase_cents, \
         seller_id, variant_id, position) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
      )
      .bind(item.id)
      .bind(item.order_id)
      .bind(item.item_kind.as_str())
      .bind(item.source_item_id)
      .bind(quantity)
      .bind(item.price_at_purchase_cents)
      .bind(item.seller_id)
      .bind(item.variant_id)
      .bind(position as i32)
      .execute(&mut *self.tx)
      .await
      .map_err(db)?;
    }
    debug!(order_id = %order.id, item_count = items.len(), "Order rows inserted.");
    Ok(())
  }

  async fn order(&mut self, order_id: Uuid) -> CommitResult<Option<Order>> {
    self.fetch_order(order_id, false).await
  }

  async fn lock_order(&mut self, order_id: Uuid) -> CommitResult<Option<Order>> {
    self.fetch_order(order_id, true).await
  }

  async fn update_order_timeline(&mut self, order: &Order) -> CommitResult<()> {
    let result = sqlx::query(
      "UPDATE orders SET shipped_at = $2, delivered_at = $3, review_started_at = $4, review_completed_at = $5 \
       WHERE id = $1",
    )
    .bind(order.id)
    .bind(order.shipped_at)
    .bind(order.delivered_at)
    .bind(order.review_started_at)
    .bind(order.review_completed_at)
    .execute(&mut *self.tx)
    .await
    .map_err(db)?;
    if result.rows_affected() == 0 {
      return Err(CommitError::store(anyhow::anyhow!("order {} does not exist", order.id)));
    }
    Ok(())
  }

  async fn order_items(&mut self, order_id: Uuid) -> CommitResult<Vec<OrderItem>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
      "SELECT id, order_id, item_kind, source_item_id, quantity, price_at_purchase_cents, seller_id, variant_id \
       FROM order_items WHERE order_id = $1 ORDER BY position",
    )
    .bind(order_id)
    .fetch_all(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(rows.into_iter().map(OrderItemRow::into_item).collect::<anyhow::Result<_>>()?)
  }

  async fn orders_for_user(&mut self, user_id: Uuid) -> CommitResult<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE user_id = $1 ORDER BY ordered_at DESC",
      ORDER_COLUMNS
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(user_id)
      .fetch_all(&mut *self.tx)
      .await
      .map_err(db)?;
    Ok(rows.into_iter().map(OrderRow::into_order).collect::<anyhow::Result<_>>()?)
  }

  async fn lock_variant(&mut self, variant_id: Uuid) -> CommitResult<Option<ShopVariant>> {
    let row = sqlx::query_as::<_, VariantRow>(
      "SELECT id, product_id, size, price_cents, stock_amt FROM shop_variants WHERE id = $1 FOR UPDATE",
    )
    .bind(variant_id)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(row.map(ShopVariant::from))
  }

  async fn set_variant_stock(&mut self, variant_id: Uuid, stock_amt: i64) -> CommitResult<()> {
    if stock_amt < 0 {
      return Err(CommitError::store(anyhow::anyhow!(
        "stock of variant {} cannot go negative ({})",
        variant_id,
        stock_amt
      )));
    }
    let result = sqlx::query("UPDATE shop_variants SET stock_amt = $2 WHERE id = $1")
      .bind(variant_id)
      .bind(stock_amt)
      .execute(&mut *self.tx)
      .await
      .map_err(db)?;
    if result.rows_affected() == 0 {
      return Err(CommitError::store(anyhow::anyhow!("variant {} does not exist", variant_id)));
    }
    Ok(())
  }

  async fn lock_listing(&mut self, listing_id: Uuid) -> CommitResult<Option<Listing>> {
    let row = sqlx::query_as::<_, ListingRow>(
      "SELECT id, seller_id, title, price_cents, status FROM listings WHERE id = $1 FOR UPDATE",
    )
    .bind(listing_id)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(row.map(ListingRow::into_listing).transpose()?)
  }

  async fn set_listing_status(&mut self, listing_id: Uuid, status: ListingStatus) -> CommitResult<()> {
    let result = sqlx::query("UPDATE listings SET status = $2 WHERE id = $1")
      .bind(listing_id)
      .bind(status.as_str())
      .execute(&mut *self.tx)
      .await
      .map_err(db)?;
    if result.rows_affected() == 0 {
      return Err(CommitError::store(anyhow::anyhow!("listing {} does not exist", listing_id)));
    }
    Ok(())
  }

  async fn upsert_variant(&mut self, variant: &ShopVariant) -> CommitResult<()> {
    sqlx::query(
      "INSERT INTO shop_variants (id, product_id, size, price_cents, stock_amt) VALUES ($1, $2, $3, $4, $5) \
       ON CONFLICT (id) DO UPDATE SET product_id = EXCLUDED.product_id, size = EXCLUDED.size, \
       price_cents = EXCLUDED.price_cents, stock_amt = EXCLUDED.stock_amt",
    )
    .bind(variant.id)
    .bind(variant.product_id)
    .bind(&variant.size)
    .bind(variant.price_cents)
    .bind(variant.stock_amt)
    .execute(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(())
  }

  async fn upsert_listing(&mut self, listing: &Listing) -> CommitResult<()> {
    sqlx::query(
      "INSERT INTO listings (id, seller_id, title, price_cents, status) VALUES ($1, $2, $3, $4, $5) \
       ON CONFLICT (id) DO UPDATE SET seller_id = EXCLUDED.seller_id, title = EXCLUDED.title, \
       price_cents = EXCLUDED.price_cents, status = EXCLUDED.status",
    )
    .bind(listing.id)
    .bind(listing.seller_id)
    .bind(&listing.title)
    .bind(listing.price_cents)
    .bind(listing.status.as_str())
    .execute(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(())
  }

  async fn voucher(&mut self, voucher_id: Uuid) -> CommitResult<Option<Voucher>> {
    let row = sqlx::query_as::<_, VoucherRow>(
      "SELECT id, code, discount_percent, points_cost FROM vouchers WHERE id = $1",
    )
    .bind(voucher_id)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(row.map(VoucherRow::into_voucher).transpose()?)
  }

  async fn vouchers(&mut self) -> CommitResult<Vec<Voucher>> {
    let rows = sqlx::query_as::<_, VoucherRow>(
      "SELECT id, code, discount_percent, points_cost FROM vouchers ORDER BY points_cost, code",
    )
    .fetch_all(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(rows.into_iter().map(VoucherRow::into_voucher).collect::<anyhow::Result<_>>()?)
  }

  async fn upsert_voucher(&mut self, voucher: &Voucher) -> CommitResult<()> {
    sqlx::query(
      "INSERT INTO vouchers (id, code, discount_percent, points_cost) VALUES ($1, $2, $3, $4) \
       ON CONFLICT (id) DO UPDATE SET code = EXCLUDED.code, discount_percent = EXCLUDED.discount_percent, \
       points_cost = EXCLUDED.points_cost",
    )
    .bind(voucher.id)
    .bind(&voucher.code)
    .bind(i16::from(voucher.discount_percent))
    .bind(voucher.points_cost)
    .execute(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(())
  }

  async fn lock_user_voucher(&mut self, user_voucher_id: Uuid) -> CommitResult<Option<UserVoucher>> {
    let row = sqlx::query_as::<_, UserVoucherRow>(
      "SELECT id, user_id, voucher_id, acquired_at, is_active, consumed_by_order FROM user_vouchers \
       WHERE id = $1 FOR UPDATE",
    )
    .bind(user_voucher_id)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(row.map(UserVoucher::from))
  }

  async fn save_user_voucher(&mut self, user_voucher: &UserVoucher) -> CommitResult<()> {
    sqlx::query(
      "INSERT INTO user_vouchers (id, user_id, voucher_id, acquired_at, is_active, consumed_by_order) \
       VALUES ($1, $2, $3, $4, $5, $6) \
       ON CONFLICT (id) DO UPDATE SET is_active = EXCLUDED.is_active, consumed_by_order = EXCLUDED.consumed_by_order",
    )
    .bind(user_voucher.id)
    .bind(user_voucher.user_id)
    .bind(user_voucher.voucher_id)
    .bind(user_voucher.acquired_at)
    .bind(user_voucher.is_active)
    .bind(user_voucher.consumed_by_order)
    .execute(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(())
  }

  async fn user_vouchers(&mut self, user_id: Uuid) -> CommitResult<Vec<UserVoucher>> {
    let rows = sqlx::query_as::<_, UserVoucherRow>(
      "SELECT id, user_id, voucher_id, acquired_at, is_active, consumed_by_order FROM user_vouchers \
       WHERE user_id = $1 ORDER BY acquired_at DESC",
    )
    .bind(user_id)
    .fetch_all(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(rows.into_iter().map(UserVoucher::from).collect())
  }

  async fn points(&mut self, user_id: Uuid) -> CommitResult<i64> {
    let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM loyalty_points WHERE user_id = $1")
      .bind(user_id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(db)?;
    Ok(balance.unwrap_or(0))
  }

  async fn lock_points(&mut self, user_id: Uuid) -> CommitResult<i64> {
    sqlx::query("INSERT INTO loyalty_points (user_id, balance) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING")
      .bind(user_id)
      .execute(&mut *self.tx)
      .await
      .map_err(db)?;
    let balance: i64 = sqlx::query_scalar("SELECT balance FROM loyalty_points WHERE user_id = $1 FOR UPDATE")
      .bind(user_id)
      .fetch_one(&mut *self.tx)
      .await
      .map_err(db)?;
    Ok(balance)
  }

  async fn set_points(&mut self, user_id: Uuid, balance: i64) -> CommitResult<()> {
    sqlx::query(
      "INSERT INTO loyalty_points (user_id, balance) VALUES ($1, $2) \
       ON CONFLICT (user_id) DO UPDATE SET balance = EXCLUDED.balance",
    )
    .bind(user_id)
    .bind(balance)
    .execute(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(())
  }

  async fn insert_review(&mut self, review: &Review) -> CommitResult<bool> {
    let result = sqlx::query(
      "INSERT INTO reviews (order_id, order_item_id, user_id, rating, comment, submitted_at) \
       VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (order_id, order_item_id) DO NOTHING",
    )
    .bind(review.order_id)
    .bind(review.order_item_id)
    .bind(review.user_id)
    .bind(i16::from(review.rating))
    .bind(&review.comment)
    .bind(review.submitted_at)
    .execute(&mut *self.tx)
    .await
    .map_err(db)?;
    Ok(result.rows_affected() == 1)
  }

  async fn reviewed_items(&mut self, order_id: Uuid) -> CommitResult<Vec<Uuid>> {
    sqlx::query_scalar("SELECT order_item_id FROM reviews WHERE order_id = $1")
      .bind(order_id)
      .fetch_all(&mut *self.tx)
      .await
      .map_err(db)
  }

  async fn commit(self: Box<Self>) -> CommitResult<()> {
    self.tx.commit().await.map_err(db)
  }

  async fn rollback(self: Box<Self>) -> CommitResult<()> {
    self.tx.rollback().await.map_err(db)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use marketplace_commit::models::{CartLine, DeliveryMethod, Listing, ListingStatus, ShopVariant, Voucher};
  use marketplace_commit::payment::MockCardProvider;
  use marketplace_commit::{
    AccountService, CommitError, CommitOutcome, CommitRequest, InventoryAdmin, NeutralScorer, OrderCommitter,
    PaymentGateways, PaymentProviderKind, StatusBroadcaster,
  };
  use std::sync::Arc;

  /// Engine over the scratch database named by `TEST_DATABASE_URL`. Every test
  /// works on fresh catalog rows so the tests can share one database.
  struct PgHarness {
    store: Arc<dyn CommerceStore>,
    admin: InventoryAdmin,
    account: AccountService,
    card: Arc<MockCardProvider>,
    committer: OrderCommitter,
  }

  impl PgHarness {
    async fn connect() -> Option<Self> {
      let url = std::env::var("TEST_DATABASE_URL").ok()?;
      let pool = crate::db::connect(&url).await.ok()?;
      crate::db::migrate(&pool).await.ok()?;
      let store: Arc<dyn CommerceStore> = Arc::new(PgStore::new(pool));
      let card = Arc::new(MockCardProvider::new());
      let committer = OrderCommitter::new(
        store.clone(),
        PaymentGateways::new().with_provider(card.clone()),
        Arc::new(NeutralScorer),
        StatusBroadcaster::new(),
      );
      Some(Self {
        admin: InventoryAdmin::new(store.clone()),
        account: AccountService::new(store.clone()),
        store,
        card,
        committer,
      })
    }

    async fn variant(&self, price_cents: i64, stock_amt: i64) -> ShopVariant {
      let variant = ShopVariant {
        id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        size: "M".to_string(),
        price_cents,
        stock_amt,
      };
      self
        .admin
        .load_catalog(std::slice::from_ref(&variant), &[], &[])
        .await
        .unwrap();
      variant
    }

    async fn listing(&self, price_cents: i64) -> Listing {
      let listing = Listing {
        id: Uuid::new_v4(),
        seller_id: Uuid::new_v4(),
        title: "Wool overcoat".to_string(),
        price_cents,
        status: ListingStatus::Available,
      };
      self
        .admin
        .load_catalog(&[], std::slice::from_ref(&listing), &[])
        .await
        .unwrap();
      listing
    }

    /// Gives `user_id` an active voucher of `discount_percent`.
    async fn voucher(&self, user_id: Uuid, discount_percent: u8) -> UserVoucher {
      let voucher = Voucher {
        id: Uuid::new_v4(),
        code: format!("PG{}", Uuid::new_v4().simple()),
        discount_percent,
        points_cost: 100,
      };
      self
        .admin
        .load_catalog(&[], &[], std::slice::from_ref(&voucher))
        .await
        .unwrap();
      self.admin.grant_points(user_id, 100).await.unwrap();
      self.account.redeem_voucher(user_id, voucher.id).await.unwrap()
    }

    fn request(
      &self,
      user_id: Uuid,
      lines: Vec<CartLine>,
      delivery_method: DeliveryMethod,
      voucher_id: Option<Uuid>,
      paid_cents: i64,
    ) -> CommitRequest {
      CommitRequest {
        user_id,
        lines,
        delivery_method,
        voucher_id,
        declared_total_cents: Some(paid_cents),
        payment_ref: self.card.settle(user_id, paid_cents, "usd"),
        provider: PaymentProviderKind::Card,
      }
    }

    async fn stock_of(&self, variant_id: Uuid) -> i64 {
      let mut tx = self.store.begin().await.unwrap();
      let variant = tx.lock_variant(variant_id).await.unwrap().unwrap();
      tx.rollback().await.unwrap();
      variant.stock_amt
    }
  }

  async fn commit_all(
    committer: &OrderCommitter,
    requests: Vec<CommitRequest>,
  ) -> Vec<Result<CommitOutcome, CommitError>> {
    let handles: Vec<_> = requests
      .into_iter()
      .map(|request| {
        let committer = committer.clone();
        tokio::spawn(async move { committer.commit(request).await })
      })
      .collect();
    let mut results = Vec::new();
    for handle in handles {
      results.push(handle.await.unwrap());
    }
    results
  }

  #[tokio::test]
  async fn concurrent_commits_of_one_payment_create_one_order() {
    let Some(h) = PgHarness::connect().await else {
      return;
    };
    let variant = h.variant(1000, 25).await;
    let request = h.request(
      Uuid::new_v4(),
      vec![CartLine::variant(variant.id, 1, 1000)],
      DeliveryMethod::Doorstep,
      None,
      1500,
    );

    let results = commit_all(&h.committer, vec![request; 4]).await;
    let mut created = 0;
    let mut order_ids = Vec::new();
    for result in results {
      let outcome = result.unwrap();
      if !outcome.is_duplicate() {
        created += 1;
      }
      order_ids.push(outcome.order.id);
    }
    assert_eq!(created, 1);
    order_ids.dedup();
    assert_eq!(order_ids.len(), 1);
    assert_eq!(h.stock_of(variant.id).await, 24);
  }

  #[tokio::test]
  async fn doorstep_cart_with_voucher_commits_everything() {
    let Some(h) = PgHarness::connect().await else {
      return;
    };
    let buyer = Uuid::new_v4();
    let v1 = h.variant(1000, 5).await;
    let m1 = h.listing(1500).await;
    let voucher = h.voucher(buyer, 10).await;

    let outcome = h
      .committer
      .commit(h.request(
        buyer,
        vec![CartLine::variant(v1.id, 2, 1000), CartLine::listing(m1.id, 1500)],
        DeliveryMethod::Doorstep,
        Some(voucher.id),
        3650,
      ))
      .await
      .unwrap();

    assert!(!outcome.is_duplicate());
    assert_eq!(outcome.order.subtotal_cents, 3500);
    assert_eq!(outcome.order.discount_cents, 350);
    assert_eq!(outcome.order.total_price_cents, 3650);
    assert_eq!(outcome.order.voucher_id_used, Some(voucher.id));
    assert_eq!(outcome.items.len(), 2);

    assert_eq!(h.stock_of(v1.id).await, 3);
    let mut tx = h.store.begin().await.unwrap();
    let listing = tx.lock_listing(m1.id).await.unwrap().unwrap();
    let consumed = tx.lock_user_voucher(voucher.id).await.unwrap().unwrap();
    let items = tx.order_items(outcome.order.id).await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(listing.status, ListingStatus::Sold);
    assert!(!consumed.is_active);
    assert_eq!(consumed.consumed_by_order, Some(outcome.order.id));
    assert_eq!(items, outcome.items);
  }

  #[tokio::test]
  async fn racing_buyers_get_the_last_unit_once() {
    let Some(h) = PgHarness::connect().await else {
      return;
    };
    let variant = h.variant(1000, 1).await;
    let requests = (0..4)
      .map(|_| {
        h.request(
          Uuid::new_v4(),
          vec![CartLine::variant(variant.id, 1, 1000)],
          DeliveryMethod::Collection,
          None,
          1000,
        )
      })
      .collect();

    let mut won = 0;
    for result in commit_all(&h.committer, requests).await {
      match result {
        Ok(outcome) => {
          assert!(!outcome.is_duplicate());
          won += 1;
        }
        Err(CommitError::InsufficientStock { .. }) => {}
        Err(other) => panic!("unexpected error: {:?}", other),
      }
    }
    assert_eq!(won, 1);
    assert_eq!(h.stock_of(variant.id).await, 0);
  }

  #[tokio::test]
  async fn one_voucher_pays_for_one_order_under_race() {
    let Some(h) = PgHarness::connect().await else {
      return;
    };
    let buyer = Uuid::new_v4();
    let voucher = h.voucher(buyer, 10).await;
    let first = h.variant(1000, 5).await;
    let second = h.variant(1000, 5).await;
    let requests = [&first, &second]
      .iter()
      .map(|variant| {
        h.request(
          buyer,
          vec![CartLine::variant(variant.id, 1, 1000)],
          DeliveryMethod::Collection,
          Some(voucher.id),
          900,
        )
      })
      .collect();

    let mut order_ids = Vec::new();
    let mut refused = 0;
    for result in commit_all(&h.committer, requests).await {
      match result {
        Ok(outcome) => order_ids.push(outcome.order.id),
        Err(CommitError::VoucherAlreadyUsed { .. }) => refused += 1,
        Err(other) => panic!("unexpected error: {:?}", other),
      }
    }
    assert_eq!((order_ids.len(), refused), (1, 1));
    assert_eq!(h.stock_of(first.id).await + h.stock_of(second.id).await, 9);

    let mut tx = h.store.begin().await.unwrap();
    let consumed = tx.lock_user_voucher(voucher.id).await.unwrap().unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(consumed.consumed_by_order, Some(order_ids[0]));
  }
}
