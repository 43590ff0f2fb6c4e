// core/src/admin.rs

//! Staff-side catalog and inventory operations.

use crate::error::CommitResult;
use crate::inventory;
use crate::models::{Listing, ShopVariant, Voucher};
use crate::store::CommerceStore;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct InventoryAdmin {
  store: Arc<dyn CommerceStore>,
}

impl InventoryAdmin {
  pub fn new(store: Arc<dyn CommerceStore>) -> Self {
    Self { store }
  }

  pub async fn restock(&self, variant_id: Uuid, amount: i64) -> CommitResult<ShopVariant> {
    let mut tx = self.store.begin().await?;
    let variant = inventory::restock(tx.as_mut(), variant_id, amount).await?;
    tx.commit().await?;
    Ok(variant)
  }

  pub async fn approve_listing(&self, listing_id: Uuid) -> CommitResult<Listing> {
    let mut tx = self.store.begin().await?;
    let listing = inventory::approve_listing(tx.as_mut(), listing_id).await?;
    tx.commit().await?;
    Ok(listing)
  }

  /// Loads catalog rows in one unit of work, replacing rows with the same id.
  #[instrument(name = "admin::load_catalog", skip_all, fields(variants = variants.len(), listings = listings.len(), vouchers = vouchers.len()))]
  pub async fn load_catalog(
    &self,
    variants: &[ShopVariant],
    listings: &[Listing],
    vouchers: &[Voucher],
  ) -> CommitResult<()> {
    let mut tx = self.store.begin().await?;
    for variant in variants {
      tx.upsert_variant(variant).await?;
    }
    for listing in listings {
      tx.upsert_listing(listing).await?;
    }
    for voucher in vouchers {
      tx.upsert_voucher(voucher).await?;
    }
    tx.commit().await?;
    Ok(())
  }

  /// Credits points to a user outside of any order.
  pub async fn grant_points(&self, user_id: Uuid, points: i64) -> CommitResult<i64> {
    let mut tx = self.store.begin().await?;
    let balance = crate::loyalty::accrue(tx.as_mut(), user_id, points).await?;
    tx.commit().await?;
    Ok(balance)
  }
}
