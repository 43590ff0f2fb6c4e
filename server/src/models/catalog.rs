// server/src/models/catalog.rs

use super::parse_column;
use marketplace_commit::models::{Listing, ListingStatus, ShopVariant};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct VariantRow {
  pub id: Uuid,
  pub product_id: Uuid,
  pub size: String,
  pub price_cents: i64,
  pub stock_amt: i64,
}

impl From<VariantRow> for ShopVariant {
  fn from(row: VariantRow) -> Self {
    ShopVariant {
      id: row.id,
      product_id: row.product_id,
      size: row.size,
      price_cents: row.price_cents,
      stock_amt: row.stock_amt,
    }
  }
}

#[derive(Debug, Clone, FromRow)]
pub struct ListingRow {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub title: String,
  pub price_cents: i64,
  pub status: String,
}

impl ListingRow {
  pub fn into_listing(self) -> anyhow::Result<Listing> {
    Ok(Listing {
      id: self.id,
      seller_id: self.seller_id,
      title: self.title,
      price_cents: self.price_cents,
      status: parse_column::<ListingStatus>("listings.status", &self.status)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn listing_rows_reject_unknown_status() {
    let row = ListingRow {
      id: Uuid::new_v4(),
      seller_id: Uuid::new_v4(),
      title: "Denim jacket".to_string(),
      price_cents: 2500,
      status: "Reserved".to_string(),
    };
    assert!(row.clone().into_listing().is_err());

    let row = ListingRow {
      status: "Available".to_string(),
      ..row
    };
    assert_eq!(row.into_listing().unwrap().status, ListingStatus::Available);
  }
}
