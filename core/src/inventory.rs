// core/src/inventory.rs

//! Inventory ledger: stock of shop variants and availability of marketplace
//! listings.
//!
//! All reads go through the row-locking accessors of [`StoreTx`], so the
//! check and the decrement of a reservation happen under the same lock and
//! no concurrent reservation can observe the gap between them.

use crate::error::{CommitError, CommitResult};
use crate::models::{CartLine, ItemKind, Listing, ListingStatus, PricedLine, ShopVariant};
use crate::store::StoreTx;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationState {
  Held,
  Committed,
  Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hold {
  Variant { variant_id: Uuid, quantity: u32 },
  Listing { listing_id: Uuid },
}

/// Claim on inventory taken inside a unit of work.
#[derive(Debug)]
pub struct ReservationToken {
  id: Uuid,
  holds: Vec<Hold>,
  state: ReservationState,
}

impl ReservationToken {
  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn holds(&self) -> &[Hold] {
    &self.holds
  }

  pub fn state(&self) -> ReservationState {
    self.state
  }

  /// Marks the reservation as final. Returns `false` if it was not held.
  pub fn commit(&mut self) -> bool {
    if self.state != ReservationState::Held {
      return false;
    }
    self.state = ReservationState::Committed;
    true
  }
}

/// Structural checks on a client cart, before anything is read.
pub fn validate_lines(lines: &[CartLine]) -> CommitResult<()> {
  if lines.is_empty() {
    return Err(CommitError::Validation("Cart is empty.".to_string()));
  }
  let mut seen = HashSet::new();
  for line in lines {
    match line.item_kind {
      ItemKind::MarketplaceListing if line.quantity != 1 => {
        return Err(CommitError::Validation(format!(
          "Marketplace listing {} must have quantity 1, got {}.",
          line.item_id, line.quantity
        )));
      }
      ItemKind::ShopVariant if line.quantity == 0 => {
        return Err(CommitError::Validation(format!(
          "Shop variant {} must have a positive quantity.",
          line.item_id
        )));
      }
      _ => {}
    }
    if !seen.insert((line.item_kind, line.item_id)) {
      return Err(CommitError::Validation(format!(
        "Item {} appears more than once in the cart.",
        line.item_id
      )));
    }
  }
  Ok(())
}

/// Reads authoritative prices for `lines`, locking the rows in a fixed order
/// (variants first, then listings, each by id). The result is in that order.
#[instrument(name = "inventory::price_lines", skip(tx, lines), fields(line_count = lines.len()))]
pub async fn price_lines(tx: &mut dyn StoreTx, lines: &[CartLine]) -> CommitResult<Vec<PricedLine>> {
  validate_lines(lines)?;

  let mut ordered: Vec<&CartLine> = lines.iter().collect();
  ordered.sort_by_key(|line| (line.item_kind == ItemKind::MarketplaceListing, line.item_id));

  let mut priced = Vec::with_capacity(ordered.len());
  for line in ordered {
    let priced_line = match line.item_kind {
      ItemKind::ShopVariant => {
        let variant = tx
          .lock_variant(line.item_id)
          .await?
          .ok_or_else(|| CommitError::NotFound(format!("Shop variant {} not found.", line.item_id)))?;
        PricedLine {
          item_kind: ItemKind::ShopVariant,
          item_id: variant.id,
          source_item_id: variant.product_id,
          quantity: line.quantity,
          unit_price_cents: variant.price_cents,
          seller_id: None,
        }
      }
      ItemKind::MarketplaceListing => {
        let listing = tx
          .lock_listing(line.item_id)
          .await?
          .ok_or_else(|| CommitError::NotFound(format!("Listing {} not found.", line.item_id)))?;
        PricedLine {
          item_kind: ItemKind::MarketplaceListing,
          item_id: listing.id,
          source_item_id: listing.id,
          quantity: 1,
          unit_price_cents: listing.price_cents,
          seller_id: Some(listing.seller_id),
        }
      }
    };
    if priced_line.unit_price_cents != line.unit_price_cents && line.unit_price_cents != 0 {
      debug!(
        item_id = %line.item_id,
        client_cents = line.unit_price_cents,
        server_cents = priced_line.unit_price_cents,
        "Client price differs from stored price."
      );
    }
    priced.push(priced_line);
  }
  Ok(priced)
}

/// Reserves every line or nothing.
///
/// Variants must have `stock_amt >= quantity` and are decremented; listings
/// must be `Available` and become `Sold`. If any line fails, holds already
/// taken are reverted before the error is returned.
#[instrument(name = "inventory::reserve", skip(tx, lines), fields(line_count = lines.len()))]
pub async fn reserve(tx: &mut dyn StoreTx, lines: &[PricedLine]) -> CommitResult<ReservationToken> {
  let mut token = ReservationToken {
    id: Uuid::new_v4(),
    holds: Vec::with_capacity(lines.len()),
    state: ReservationState::Held,
  };

  for line in lines {
    match hold_line(tx, line).await {
      Ok(hold) => token.holds.push(hold),
      Err(err) => {
        warn!(item_id = %line.item_id, error = %err, "Reservation failed, reverting partial holds.");
        release_after_failure(tx, &mut token, &err).await;
        return Err(err);
      }
    }
  }

  info!(reservation_id = %token.id, holds = token.holds.len(), "Inventory reserved.");
  Ok(token)
}

async fn hold_line(tx: &mut dyn StoreTx, line: &PricedLine) -> CommitResult<Hold> {
  match line.item_kind {
    ItemKind::ShopVariant => {
      let variant = tx
        .lock_variant(line.item_id)
        .await?
        .ok_or_else(|| CommitError::NotFound(format!("Shop variant {} not found.", line.item_id)))?;
      if variant.stock_amt < i64::from(line.quantity) {
        return Err(CommitError::InsufficientStock {
          variant_id: variant.id,
          requested: line.quantity,
          available: variant.stock_amt,
        });
      }
      tx.set_variant_stock(variant.id, variant.stock_amt - i64::from(line.quantity))
        .await?;
      Ok(Hold::Variant {
        variant_id: variant.id,
        quantity: line.quantity,
      })
    }
    ItemKind::MarketplaceListing => {
      let listing = tx
        .lock_listing(line.item_id)
        .await?
        .ok_or_else(|| CommitError::NotFound(format!("Listing {} not found.", line.item_id)))?;
      if listing.status != ListingStatus::Available {
        return Err(CommitError::ListingUnavailable {
          listing_id: listing.id,
          status: listing.status,
        });
      }
      tx.set_listing_status(listing.id, ListingStatus::Sold).await?;
      Ok(Hold::Listing { listing_id: listing.id })
    }
  }
}

/// Reverts every hold of a reservation. Only acts on a held reservation;
/// returns `false` (and touches nothing) if it was already released or
/// committed.
#[instrument(name = "inventory::release", skip(tx, token), fields(reservation_id = %token.id))]
pub async fn release(tx: &mut dyn StoreTx, token: &mut ReservationToken) -> CommitResult<bool> {
  if token.state != ReservationState::Held {
    return Ok(false);
  }
  for hold in token.holds.iter().rev() {
    match hold {
      Hold::Variant { variant_id, quantity } => {
        if let Some(variant) = tx.lock_variant(*variant_id).await? {
          tx.set_variant_stock(variant.id, variant.stock_amt + i64::from(*quantity))
            .await?;
        }
      }
      Hold::Listing { listing_id } => {
        tx.set_listing_status(*listing_id, ListingStatus::Available).await?;
      }
    }
  }
  token.state = ReservationState::Released;
  debug!("Reservation released.");
  Ok(true)
}

/// Releases `token` after `cause` aborted the reservation or a later commit
/// step. A storage failure may have poisoned the unit of work, so holds are
/// then left to the rollback. A failed release is logged, never returned:
/// the caller reports `cause`.
pub async fn release_after_failure(tx: &mut dyn StoreTx, token: &mut ReservationToken, cause: &CommitError) {
  if matches!(cause, CommitError::Store { .. }) {
    debug!(reservation_id = %token.id, "Storage failure, leaving holds to the rollback.");
    return;
  }
  if let Err(err) = release(tx, token).await {
    warn!(reservation_id = %token.id, error = %err, "Could not release holds, relying on rollback.");
  }
}

/// Adds `amount` units to a shop variant.
#[instrument(name = "inventory::restock", skip(tx))]
pub async fn restock(tx: &mut dyn StoreTx, variant_id: Uuid, amount: i64) -> CommitResult<ShopVariant> {
  if amount <= 0 {
    return Err(CommitError::Validation("Restock amount must be positive.".to_string()));
  }
  let mut variant = tx
    .lock_variant(variant_id)
    .await?
    .ok_or_else(|| CommitError::NotFound(format!("Shop variant {} not found.", variant_id)))?;
  variant.stock_amt = variant
    .stock_amt
    .checked_add(amount)
    .ok_or_else(|| CommitError::Validation(format!("Restocking {} units would overflow the stock count.", amount)))?;
  tx.set_variant_stock(variant_id, variant.stock_amt).await?;
  info!(stock_amt = variant.stock_amt, "Variant restocked.");
  Ok(variant)
}

/// Moves a listing from `Pending` to `Available`. Approving an already
/// available listing is a no-op; a sold listing is never touched.
#[instrument(name = "inventory::approve_listing", skip(tx))]
pub async fn approve_listing(tx: &mut dyn StoreTx, listing_id: Uuid) -> CommitResult<Listing> {
  let mut listing = tx
    .lock_listing(listing_id)
    .await?
    .ok_or_else(|| CommitError::NotFound(format!("Listing {} not found.", listing_id)))?;
  match listing.status {
    ListingStatus::Pending => {
      tx.set_listing_status(listing_id, ListingStatus::Available).await?;
      listing.status = ListingStatus::Available;
      info!("Listing approved.");
      Ok(listing)
    }
    ListingStatus::Available => Ok(listing),
    ListingStatus::Sold => Err(CommitError::ListingUnavailable {
      listing_id,
      status: ListingStatus::Sold,
    }),
  }
}
