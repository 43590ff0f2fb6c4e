// core/src/pricing.rs

//! Pure price computation. No storage, no I/O.

use crate::error::{CommitError, CommitResult};
use crate::models::{DeliveryMethod, PricedLine, UserVoucher, Voucher};
use serde::{Deserialize, Serialize};

/// Flat Doorstep fee, in cents.
pub const DEFAULT_SHIPPING_FEE_CENTS: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
  pub shipping_fee_cents: i64,
  /// Largest accepted gap between a declared and a computed total.
  pub price_tolerance_cents: i64,
}

impl Default for PricingPolicy {
  fn default() -> Self {
    Self {
      shipping_fee_cents: DEFAULT_SHIPPING_FEE_CENTS,
      price_tolerance_cents: 1,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
  pub subtotal_cents: i64,
  pub shipping_fee_cents: i64,
  pub discount_cents: i64,
  pub total_cents: i64,
}

/// Prices a cart snapshot.
///
/// The voucher only counts when it is still redeemable. The discount is
/// rounded half up to the cent and never exceeds the subtotal; the total is
/// clamped at zero.
pub fn quote(
  lines: &[PricedLine],
  delivery: DeliveryMethod,
  voucher: Option<(&UserVoucher, &Voucher)>,
  policy: &PricingPolicy,
) -> PriceQuote {
  let subtotal_cents: i64 = lines.iter().map(PricedLine::line_total_cents).sum();
  let shipping_fee_cents = match delivery {
    DeliveryMethod::Doorstep => policy.shipping_fee_cents,
    DeliveryMethod::Collection => 0,
  };
  let discount_cents = match voucher {
    Some((owned, voucher)) if owned.is_redeemable() => percent_of(subtotal_cents, voucher.discount_percent),
    _ => 0,
  };
  let total_cents = (subtotal_cents + shipping_fee_cents - discount_cents).max(0);

  PriceQuote {
    subtotal_cents,
    shipping_fee_cents,
    discount_cents,
    total_cents,
  }
}

fn percent_of(amount_cents: i64, percent: u8) -> i64 {
  if amount_cents <= 0 {
    return 0;
  }
  let percent = i64::from(percent.min(100));
  ((amount_cents * percent + 50) / 100).min(amount_cents)
}

/// Fails with `PriceMismatch` when `declared` and `computed` differ by more
/// than `tolerance` cents.
pub fn ensure_matches(declared_cents: i64, computed_cents: i64, tolerance_cents: i64) -> CommitResult<()> {
  if (declared_cents - computed_cents).abs() > tolerance_cents {
    return Err(CommitError::PriceMismatch {
      declared_cents,
      computed_cents,
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::ItemKind;
  use chrono::Utc;
  use uuid::Uuid;

  fn line(kind: ItemKind, unit_price_cents: i64, quantity: u32) -> PricedLine {
    PricedLine {
      item_kind: kind,
      item_id: Uuid::new_v4(),
      source_item_id: Uuid::new_v4(),
      quantity,
      unit_price_cents,
      seller_id: None,
    }
  }

  fn voucher(percent: u8, active: bool) -> (UserVoucher, Voucher) {
    let voucher = Voucher {
      id: Uuid::new_v4(),
      code: "GREEN10".to_string(),
      discount_percent: percent,
      points_cost: 100,
    };
    let owned = UserVoucher {
      id: Uuid::new_v4(),
      user_id: Uuid::new_v4(),
      voucher_id: voucher.id,
      acquired_at: Utc::now(),
      is_active: active,
      consumed_by_order: None,
    };
    (owned, voucher)
  }

  #[test]
  fn doorstep_cart_with_ten_percent_voucher() {
    let lines = vec![
      line(ItemKind::ShopVariant, 1000, 2),
      line(ItemKind::MarketplaceListing, 1500, 1),
    ];
    let (owned, v) = voucher(10, true);
    let q = quote(&lines, DeliveryMethod::Doorstep, Some((&owned, &v)), &PricingPolicy::default());
    assert_eq!(q.subtotal_cents, 3500);
    assert_eq!(q.shipping_fee_cents, 500);
    assert_eq!(q.discount_cents, 350);
    assert_eq!(q.total_cents, 3650);
  }

  #[test]
  fn collection_has_no_fee() {
    let lines = vec![line(ItemKind::ShopVariant, 1999, 1)];
    let q = quote(&lines, DeliveryMethod::Collection, None, &PricingPolicy::default());
    assert_eq!(q.shipping_fee_cents, 0);
    assert_eq!(q.total_cents, 1999);
  }

  #[test]
  fn inactive_voucher_gives_no_discount() {
    let lines = vec![line(ItemKind::ShopVariant, 2000, 1)];
    let (owned, v) = voucher(50, false);
    let q = quote(&lines, DeliveryMethod::Collection, Some((&owned, &v)), &PricingPolicy::default());
    assert_eq!(q.discount_cents, 0);
    assert_eq!(q.total_cents, 2000);
  }

  #[test]
  fn consumed_voucher_gives_no_discount() {
    let lines = vec![line(ItemKind::ShopVariant, 2000, 1)];
    let (mut owned, v) = voucher(50, true);
    owned.consumed_by_order = Some(Uuid::new_v4());
    let q = quote(&lines, DeliveryMethod::Collection, Some((&owned, &v)), &PricingPolicy::default());
    assert_eq!(q.discount_cents, 0);
  }

  #[test]
  fn discount_rounds_half_up_and_is_capped() {
    let lines = vec![line(ItemKind::ShopVariant, 5, 1)];
    let (owned, v) = voucher(10, true);
    let q = quote(&lines, DeliveryMethod::Collection, Some((&owned, &v)), &PricingPolicy::default());
    assert_eq!(q.discount_cents, 1);

    let (owned, v) = voucher(250, true);
    let q = quote(&lines, DeliveryMethod::Doorstep, Some((&owned, &v)), &PricingPolicy::default());
    assert_eq!(q.discount_cents, 5);
    assert_eq!(q.total_cents, 500);
  }

  #[test]
  fn total_never_negative_and_identity_holds() {
    let policy = PricingPolicy {
      shipping_fee_cents: 0,
      price_tolerance_cents: 1,
    };
    for (price, qty, pct) in [(0, 1, 100u8), (1, 3, 99), (999, 2, 0), (1234, 7, 33)] {
      let lines = vec![line(ItemKind::ShopVariant, price, qty)];
      let (owned, v) = voucher(pct, true);
      let q = quote(&lines, DeliveryMethod::Doorstep, Some((&owned, &v)), &policy);
      assert!(q.total_cents >= 0);
      assert_eq!(q.total_cents, q.subtotal_cents + q.shipping_fee_cents - q.discount_cents);
    }
  }

  #[test]
  fn tolerance_check() {
    assert!(ensure_matches(3650, 3650, 1).is_ok());
    assert!(ensure_matches(3651, 3650, 1).is_ok());
    match ensure_matches(3600, 3650, 1) {
      Err(CommitError::PriceMismatch {
        declared_cents,
        computed_cents,
      }) => {
        assert_eq!(declared_cents, 3600);
        assert_eq!(computed_cents, 3650);
      }
      other => panic!("expected PriceMismatch, got {:?}", other),
    }
  }
}
