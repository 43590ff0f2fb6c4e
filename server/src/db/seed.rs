// server/src/db/seed.rs

//! Demo catalog for local runs.

use marketplace_commit::models::{Listing, ListingStatus, ShopVariant, Voucher};
use marketplace_commit::{CommitResult, InventoryAdmin};
use uuid::Uuid;

/// Fixed ids so a seeded catalog can be addressed from scripts.
pub const TEE_PRODUCT_ID: Uuid = Uuid::from_u128(0x1000);
pub const TEE_M_VARIANT_ID: Uuid = Uuid::from_u128(0x1001);
pub const TEE_L_VARIANT_ID: Uuid = Uuid::from_u128(0x1002);
pub const JACKET_LISTING_ID: Uuid = Uuid::from_u128(0x2001);
pub const TEN_OFF_VOUCHER_ID: Uuid = Uuid::from_u128(0x3001);

pub fn demo_catalog() -> (Vec<ShopVariant>, Vec<Listing>, Vec<Voucher>) {
  let variants = vec![
    ShopVariant {
      id: TEE_M_VARIANT_ID,
      product_id: TEE_PRODUCT_ID,
      size: "M".to_string(),
      price_cents: 1000,
      stock_amt: 25,
    },
    ShopVariant {
      id: TEE_L_VARIANT_ID,
      product_id: TEE_PRODUCT_ID,
      size: "L".to_string(),
      price_cents: 1000,
      stock_amt: 5,
    },
  ];
  let listings = vec![Listing {
    id: JACKET_LISTING_ID,
    seller_id: Uuid::from_u128(0x9001),
    title: "Vintage denim jacket".to_string(),
    price_cents: 1500,
    status: ListingStatus::Available,
  }];
  let vouchers = vec![
    Voucher {
      id: TEN_OFF_VOUCHER_ID,
      code: "TENOFF".to_string(),
      discount_percent: 10,
      points_cost: 100,
    },
    Voucher {
      id: Uuid::from_u128(0x3002),
      code: "QUARTEROFF".to_string(),
      discount_percent: 25,
      points_cost: 300,
    },
  ];
  (variants, listings, vouchers)
}

pub async fn seed_demo_catalog(admin: &InventoryAdmin) -> CommitResult<()> {
  let (variants, listings, vouchers) = demo_catalog();
  admin.load_catalog(&variants, &listings, &vouchers).await?;
  tracing::info!(
    variants = variants.len(),
    listings = listings.len(),
    vouchers = vouchers.len(),
    "Demo catalog seeded."
  );
  Ok(())
}
