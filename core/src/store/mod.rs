// core/src/store/mod.rs

//! Storage seam of the engine.
//!
//! Every mutation the engine performs happens inside a [`StoreTx`] opened by
//! [`CommerceStore::begin`]. A transaction either commits as a whole or leaves
//! no trace; dropping it without calling `commit` is a rollback.
//!
//! The `lock_*` reads take an exclusive row lock that is held until the
//! transaction ends, so a check made on the returned row stays valid for the
//! rest of the unit of work. Backends must guarantee that two transactions
//! locking the same row are serialised.

pub mod memory;

use crate::error::CommitResult;
use crate::models::{
  Listing, ListingStatus, Order, OrderItem, PaymentKey, Review, ShopVariant, UserVoucher, Voucher,
};
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryStore;

#[async_trait]
pub trait CommerceStore: Send + Sync + 'static {
  /// Opens a new unit of work.
  async fn begin(&self) -> CommitResult<Box<dyn StoreTx>>;
}

#[async_trait]
pub trait StoreTx: Send {
  // --- Orders ---

  /// Looks up the order committed for a payment and holds an exclusive lock on
  /// the payment key until the transaction ends, whether or not an order exists.
  async fn find_order_for_payment(&mut self, key: &PaymentKey) -> CommitResult<Option<Order>>;

  /// Inserts an order and all of its items. Fails if the payment key is taken.
  async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> CommitResult<()>;

  async fn order(&mut self, order_id: Uuid) -> CommitResult<Option<Order>>;

  async fn lock_order(&mut self, order_id: Uuid) -> CommitResult<Option<Order>>;

  /// Persists the fulfillment timestamps of an existing order. Nothing else changes.
  async fn update_order_timeline(&mut self, order: &Order) -> CommitResult<()>;

  async fn order_items(&mut self, order_id: Uuid) -> CommitResult<Vec<OrderItem>>;

  /// Orders of a user, newest first.
  async fn orders_for_user(&mut self, user_id: Uuid) -> CommitResult<Vec<Order>>;

  // --- Inventory ---

  async fn lock_variant(&mut self, variant_id: Uuid) -> CommitResult<Option<ShopVariant>>;

  async fn set_variant_stock(&mut self, variant_id: Uuid, stock_amt: i64) -> CommitResult<()>;

  async fn lock_listing(&mut self, listing_id: Uuid) -> CommitResult<Option<Listing>>;

  async fn set_listing_status(&mut self, listing_id: Uuid, status: ListingStatus) -> CommitResult<()>;

  async fn upsert_variant(&mut self, variant: &ShopVariant) -> CommitResult<()>;

  async fn upsert_listing(&mut self, listing: &Listing) -> CommitResult<()>;

  // --- Vouchers ---

  async fn voucher(&mut self, voucher_id: Uuid) -> CommitResult<Option<Voucher>>;

  async fn vouchers(&mut self) -> CommitResult<Vec<Voucher>>;

  async fn upsert_voucher(&mut self, voucher: &Voucher) -> CommitResult<()>;

  async fn lock_user_voucher(&mut self, user_voucher_id: Uuid) -> CommitResult<Option<UserVoucher>>;

  /// Inserts or replaces a user voucher row.
  async fn save_user_voucher(&mut self, user_voucher: &UserVoucher) -> CommitResult<()>;

  async fn user_vouchers(&mut self, user_id: Uuid) -> CommitResult<Vec<UserVoucher>>;

  // --- Loyalty ---

  /// Current balance without locking; `0` for unknown users.
  async fn points(&mut self, user_id: Uuid) -> CommitResult<i64>;

  /// Locks the ledger row of a user, creating it with a zero balance if needed.
  async fn lock_points(&mut self, user_id: Uuid) -> CommitResult<i64>;

  async fn set_points(&mut self, user_id: Uuid, balance: i64) -> CommitResult<()>;

  // --- Reviews ---

  /// Records a review. Returns `false` if the item already has one.
  async fn insert_review(&mut self, review: &Review) -> CommitResult<bool>;

  /// Order item ids of `order_id` that have a review.
  async fn reviewed_items(&mut self, order_id: Uuid) -> CommitResult<Vec<Uuid>>;

  // --- Lifecycle ---

  async fn commit(self: Box<Self>) -> CommitResult<()>;

  async fn rollback(self: Box<Self>) -> CommitResult<()>;
}
