// core/src/account.rs

//! Buyer-facing reads and voucher management.

use crate::error::{CommitError, CommitResult};
use crate::models::{Order, OrderDetails, UserVoucher, Voucher};
use crate::store::CommerceStore;
use crate::voucher_guard;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnedVoucher {
  #[serde(flatten)]
  pub user_voucher: UserVoucher,
  pub voucher: Voucher,
}

#[derive(Clone)]
pub struct AccountService {
  store: Arc<dyn CommerceStore>,
}

impl AccountService {
  pub fn new(store: Arc<dyn CommerceStore>) -> Self {
    Self { store }
  }

  pub async fn points(&self, user_id: Uuid) -> CommitResult<i64> {
    let mut tx = self.store.begin().await?;
    let balance = tx.points(user_id).await?;
    tx.rollback().await?;
    Ok(balance)
  }

  pub async fn voucher_catalog(&self) -> CommitResult<Vec<Voucher>> {
    let mut tx = self.store.begin().await?;
    let vouchers = tx.vouchers().await?;
    tx.rollback().await?;
    Ok(vouchers)
  }

  pub async fn my_vouchers(&self, user_id: Uuid) -> CommitResult<Vec<OwnedVoucher>> {
    let mut tx = self.store.begin().await?;
    let owned = tx.user_vouchers(user_id).await?;
    let catalog: HashMap<Uuid, Voucher> = tx.vouchers().await?.into_iter().map(|v| (v.id, v)).collect();
    tx.rollback().await?;

    Ok(
      owned
        .into_iter()
        .filter_map(|user_voucher| {
          let voucher = catalog.get(&user_voucher.voucher_id)?.clone();
          Some(OwnedVoucher { user_voucher, voucher })
        })
        .collect(),
    )
  }

  /// Spends loyalty points on a voucher from the catalog.
  pub async fn redeem_voucher(&self, user_id: Uuid, voucher_id: Uuid) -> CommitResult<UserVoucher> {
    let mut tx = self.store.begin().await?;
    let owned = voucher_guard::redeem(tx.as_mut(), user_id, voucher_id).await?;
    tx.commit().await?;
    Ok(owned)
  }

  pub async fn set_voucher_active(
    &self,
    user_id: Uuid,
    user_voucher_id: Uuid,
    active: bool,
  ) -> CommitResult<UserVoucher> {
    let mut tx = self.store.begin().await?;
    let owned = voucher_guard::set_active(tx.as_mut(), user_id, user_voucher_id, active).await?;
    tx.commit().await?;
    Ok(owned)
  }

  /// Orders of a user, newest first.
  pub async fn orders(&self, user_id: Uuid) -> CommitResult<Vec<Order>> {
    let mut tx = self.store.begin().await?;
    let orders = tx.orders_for_user(user_id).await?;
    tx.rollback().await?;
    Ok(orders)
  }

  /// Full state of one of the user's orders. Other users' orders are
  /// reported as not found.
  pub async fn order_details(&self, user_id: Uuid, order_id: Uuid) -> CommitResult<OrderDetails> {
    let mut tx = self.store.begin().await?;
    let order = tx
      .order(order_id)
      .await?
      .filter(|order| order.user_id == user_id)
      .ok_or_else(|| CommitError::NotFound(format!("Order {} not found.", order_id)))?;
    let items = tx.order_items(order_id).await?;
    tx.rollback().await?;
    Ok(OrderDetails { order, items })
  }
}
