// server/src/models/mod.rs

//! Row types of the Postgres schema and their conversion to engine models.

pub mod catalog;
pub mod order;
pub mod voucher;

pub use catalog::{ListingRow, VariantRow};
pub use order::{OrderItemRow, OrderRow};
pub use voucher::{UserVoucherRow, VoucherRow};

use std::str::FromStr;

pub(crate) fn parse_column<T>(column: &str, raw: &str) -> anyhow::Result<T>
where
  T: FromStr<Err = String>,
{
  raw
    .parse::<T>()
    .map_err(|e| anyhow::anyhow!("Invalid value in column '{}': {}", column, e))
}
