// core/src/models/cart.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which inventory domain a cart line draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
  /// Peer-to-peer, single unit, sold at most once.
  MarketplaceListing,
  /// First-party stocked product at a given size.
  ShopVariant,
}

impl ItemKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ItemKind::MarketplaceListing => "marketplace_listing",
      ItemKind::ShopVariant => "shop_variant",
    }
  }
}

impl fmt::Display for ItemKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ItemKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "marketplace_listing" => Ok(ItemKind::MarketplaceListing),
      "shop_variant" => Ok(ItemKind::ShopVariant),
      other => Err(format!("unknown item kind '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMethod {
  Collection,
  Doorstep,
}

impl DeliveryMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      DeliveryMethod::Collection => "Collection",
      DeliveryMethod::Doorstep => "Doorstep",
    }
  }
}

impl fmt::Display for DeliveryMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DeliveryMethod {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Collection" => Ok(DeliveryMethod::Collection),
      "Doorstep" => Ok(DeliveryMethod::Doorstep),
      other => Err(format!("unknown delivery method '{}'", other)),
    }
  }
}

/// A cart line as the client sent it. Prices here are informational only;
/// the engine re-reads price and availability from storage before using them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
  pub item_kind: ItemKind,
  pub item_id: Uuid,
  #[serde(default)]
  pub unit_price_cents: i64,
  pub quantity: u32,
  #[serde(default)]
  pub snapshot_display_price_cents: i64,
}

impl CartLine {
  pub fn listing(listing_id: Uuid, unit_price_cents: i64) -> Self {
    Self {
      item_kind: ItemKind::MarketplaceListing,
      item_id: listing_id,
      unit_price_cents,
      quantity: 1,
      snapshot_display_price_cents: unit_price_cents,
    }
  }

  pub fn variant(variant_id: Uuid, quantity: u32, unit_price_cents: i64) -> Self {
    Self {
      item_kind: ItemKind::ShopVariant,
      item_id: variant_id,
      unit_price_cents,
      quantity,
      snapshot_display_price_cents: unit_price_cents,
    }
  }
}

/// A cart line after the authoritative price has been read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
  pub item_kind: ItemKind,
  pub item_id: Uuid,
  /// Listing id, or the product a variant belongs to.
  pub source_item_id: Uuid,
  pub quantity: u32,
  pub unit_price_cents: i64,
  /// Seller of a marketplace listing; `None` for shop variants.
  pub seller_id: Option<Uuid>,
}

impl PricedLine {
  pub fn line_total_cents(&self) -> i64 {
    self.unit_price_cents * i64::from(self.quantity)
  }
}
