// core/src/models/voucher.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog entry. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
  pub id: Uuid,
  pub code: String,
  pub discount_percent: u8,
  pub points_cost: i64,
}

/// A voucher owned by a user.
///
/// `is_active` gates whether it may be applied to a checkout. Once a commit
/// consumes it, `consumed_by_order` is set and `is_active` stays false forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVoucher {
  pub id: Uuid,
  pub user_id: Uuid,
  pub voucher_id: Uuid,
  pub acquired_at: DateTime<Utc>,
  pub is_active: bool,
  pub consumed_by_order: Option<Uuid>,
}

impl UserVoucher {
  pub fn is_redeemable(&self) -> bool {
    self.is_active && self.consumed_by_order.is_none()
  }
}
