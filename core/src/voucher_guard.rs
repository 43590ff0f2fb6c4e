// core/src/voucher_guard.rs

//! Voucher redemption guard. Owns the activation state of user vouchers.
//!
//! A user voucher is consumed under its row lock in the same unit of work that
//! creates the order, so of two checkouts racing for one voucher exactly one
//! can see it active.

use crate::error::{CommitError, CommitResult};
use crate::loyalty;
use crate::models::{UserVoucher, Voucher};
use crate::store::StoreTx;
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Proof that a voucher was consumed for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionToken {
  pub user_voucher_id: Uuid,
  pub order_id: Uuid,
  pub discount_percent: u8,
}

async fn owned(tx: &mut dyn StoreTx, user_id: Uuid, user_voucher_id: Uuid) -> CommitResult<UserVoucher> {
  match tx.lock_user_voucher(user_voucher_id).await? {
    Some(uv) if uv.user_id == user_id => Ok(uv),
    _ => Err(CommitError::VoucherNotOwned {
      user_voucher_id,
      user_id,
    }),
  }
}

async fn catalog_entry(tx: &mut dyn StoreTx, voucher_id: Uuid) -> CommitResult<Voucher> {
  tx.voucher(voucher_id)
    .await?
    .ok_or_else(|| CommitError::NotFound(format!("Voucher {} not found.", voucher_id)))
}

/// Locks and returns a voucher the user may apply right now.
#[instrument(name = "voucher::peek", skip(tx))]
pub async fn peek(
  tx: &mut dyn StoreTx,
  user_id: Uuid,
  user_voucher_id: Uuid,
) -> CommitResult<(UserVoucher, Voucher)> {
  let uv = owned(tx, user_id, user_voucher_id).await?;
  if !uv.is_redeemable() {
    return Err(CommitError::VoucherAlreadyUsed { user_voucher_id });
  }
  let voucher = catalog_entry(tx, uv.voucher_id).await?;
  Ok((uv, voucher))
}

/// Consumes a voucher for `order_id`, flipping it permanently inactive.
#[instrument(name = "voucher::consume", skip(tx))]
pub async fn consume(
  tx: &mut dyn StoreTx,
  user_id: Uuid,
  user_voucher_id: Uuid,
  order_id: Uuid,
) -> CommitResult<ConsumptionToken> {
  let (mut uv, voucher) = peek(tx, user_id, user_voucher_id).await?;
  uv.is_active = false;
  uv.consumed_by_order = Some(order_id);
  tx.save_user_voucher(&uv).await?;
  info!("Voucher consumed.");
  Ok(ConsumptionToken {
    user_voucher_id,
    order_id,
    discount_percent: voucher.discount_percent,
  })
}

/// Spends `points_cost` loyalty points on a new active voucher.
#[instrument(name = "voucher::redeem", skip(tx))]
pub async fn redeem(tx: &mut dyn StoreTx, user_id: Uuid, voucher_id: Uuid) -> CommitResult<UserVoucher> {
  let voucher = catalog_entry(tx, voucher_id).await?;
  let balance = loyalty::debit(tx, user_id, voucher.points_cost).await?;
  let uv = UserVoucher {
    id: Uuid::new_v4(),
    user_id,
    voucher_id,
    acquired_at: Utc::now(),
    is_active: true,
    consumed_by_order: None,
  };
  tx.save_user_voucher(&uv).await?;
  info!(user_voucher_id = %uv.id, remaining_points = balance, "Voucher redeemed.");
  Ok(uv)
}

/// Activates or deactivates an unconsumed voucher. A consumed voucher can be
/// "deactivated" again (no-op) but never reactivated.
#[instrument(name = "voucher::set_active", skip(tx))]
pub async fn set_active(
  tx: &mut dyn StoreTx,
  user_id: Uuid,
  user_voucher_id: Uuid,
  active: bool,
) -> CommitResult<UserVoucher> {
  let mut uv = owned(tx, user_id, user_voucher_id).await?;
  if uv.consumed_by_order.is_some() {
    if active {
      return Err(CommitError::VoucherAlreadyUsed { user_voucher_id });
    }
    return Ok(uv);
  }
  if uv.is_active != active {
    uv.is_active = active;
    tx.save_user_voucher(&uv).await?;
  }
  Ok(uv)
}
