// server/src/models/voucher.rs

use chrono::{DateTime, Utc};
use marketplace_commit::models::{UserVoucher, Voucher};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct VoucherRow {
  pub id: Uuid,
  pub code: String,
  pub discount_percent: i16,
  pub points_cost: i64,
}

impl VoucherRow {
  pub fn into_voucher(self) -> anyhow::Result<Voucher> {
    let discount_percent = u8::try_from(self.discount_percent)
      .map_err(|_| anyhow::anyhow!("Voucher {} has discount_percent {}", self.id, self.discount_percent))?;
    Ok(Voucher {
      id: self.id,
      code: self.code,
      discount_percent,
      points_cost: self.points_cost,
    })
  }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserVoucherRow {
  pub id: Uuid,
  pub user_id: Uuid,
  pub voucher_id: Uuid,
  pub acquired_at: DateTime<Utc>,
  pub is_active: bool,
  pub consumed_by_order: Option<Uuid>,
}

impl From<UserVoucherRow> for UserVoucher {
  fn from(row: UserVoucherRow) -> Self {
    UserVoucher {
      id: row.id,
      user_id: row.user_id,
      voucher_id: row.voucher_id,
      acquired_at: row.acquired_at,
      is_active: row.is_active,
      consumed_by_order: row.consumed_by_order,
    }
  }
}
