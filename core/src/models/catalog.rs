// core/src/models/catalog.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopVariant {
  pub id: Uuid,
  pub product_id: Uuid,
  pub size: String,
  pub price_cents: i64,
  pub stock_amt: i64,
}

/// Listing lifecycle. `Sold` is terminal and only reachable through a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
  Pending,
  Available,
  Sold,
}

impl ListingStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ListingStatus::Pending => "Pending",
      ListingStatus::Available => "Available",
      ListingStatus::Sold => "Sold",
    }
  }
}

impl fmt::Display for ListingStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ListingStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Pending" => Ok(ListingStatus::Pending),
      "Available" => Ok(ListingStatus::Available),
      "Sold" => Ok(ListingStatus::Sold),
      other => Err(format!("unknown listing status '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub title: String,
  pub price_cents: i64,
  pub status: ListingStatus,
}
