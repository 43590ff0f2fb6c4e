// tests/voucher_tests.rs
mod common;

use common::*;
use marketplace_commit::models::{CartLine, DeliveryMethod};
use marketplace_commit::CommitError;
use serial_test::serial;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn one_voucher_one_order_under_race() {
  setup_tracing();
  let h = Harness::new();
  let buyer = Uuid::new_v4();
  let voucher = h.give_voucher(buyer, 20).await;
  let first = h.add_variant(1000, 5).await;
  let second = h.add_variant(1000, 5).await;

  let mut handles = Vec::new();
  for variant in [&first, &second] {
    let committer = h.committer.clone();
    let payment_ref = h.pay(buyer, 800);
    let req = request(
      buyer,
      vec![CartLine::variant(variant.id, 1, 1000)],
      DeliveryMethod::Collection,
      Some(voucher.id),
      &payment_ref,
    );
    handles.push(tokio::spawn(async move { committer.commit(req).await }));
  }

  let mut won = Vec::new();
  let mut refused = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(outcome) => won.push(outcome.order),
      Err(CommitError::VoucherAlreadyUsed { .. }) => refused += 1,
      Err(other) => panic!("unexpected error: {:?}", other),
    }
  }
  assert_eq!(won.len(), 1);
  assert_eq!(refused, 1);
  let consumed = h.store.user_voucher(voucher.id).await.unwrap();
  assert_eq!(consumed.consumed_by_order, Some(won[0].id));
  let remaining = h.store.variant(first.id).await.unwrap().stock_amt + h.store.variant(second.id).await.unwrap().stock_amt;
  assert_eq!(remaining, 9);
}

#[tokio::test]
#[serial]
async fn consumed_voucher_stays_consumed() {
  setup_tracing();
  let h = Harness::new();
  let buyer = Uuid::new_v4();
  let voucher = h.give_voucher(buyer, 10).await;
  let variant = h.add_variant(1000, 5).await;
  let payment_ref = h.pay(buyer, 900);
  h.committer
    .commit(request(
      buyer,
      vec![CartLine::variant(variant.id, 1, 1000)],
      DeliveryMethod::Collection,
      Some(voucher.id),
      &payment_ref,
    ))
    .await
    .unwrap();

  let err = h
    .account
    .set_voucher_active(buyer, voucher.id, true)
    .await
    .unwrap_err();
  assert!(matches!(err, CommitError::VoucherAlreadyUsed { .. }));
  let still = h.account.set_voucher_active(buyer, voucher.id, false).await.unwrap();
  assert!(!still.is_active);

  let payment_ref = h.pay(buyer, 900);
  let err = h
    .committer
    .commit(request(
      buyer,
      vec![CartLine::variant(variant.id, 1, 1000)],
      DeliveryMethod::Collection,
      Some(voucher.id),
      &payment_ref,
    ))
    .await
    .unwrap_err();
  assert!(matches!(err, CommitError::VoucherAlreadyUsed { .. }));
}

#[tokio::test]
#[serial]
async fn deactivated_voucher_cannot_be_applied_until_reactivated() {
  setup_tracing();
  let h = Harness::new();
  let buyer = Uuid::new_v4();
  let voucher = h.give_voucher(buyer, 10).await;
  let variant = h.add_variant(1000, 5).await;

  let off = h.account.set_voucher_active(buyer, voucher.id, false).await.unwrap();
  assert!(!off.is_active);
  let payment_ref = h.pay(buyer, 900);
  let req = request(
    buyer,
    vec![CartLine::variant(variant.id, 1, 1000)],
    DeliveryMethod::Collection,
    Some(voucher.id),
    &payment_ref,
  );
  assert!(matches!(
    h.committer.commit(req.clone()).await,
    Err(CommitError::VoucherAlreadyUsed { .. })
  ));

  h.account.set_voucher_active(buyer, voucher.id, true).await.unwrap();
  let outcome = h.committer.commit(req).await.unwrap();
  assert_eq!(outcome.order.discount_cents, 100);
}

#[tokio::test]
#[serial]
async fn redeeming_spends_points() {
  setup_tracing();
  let h = Harness::new();
  let buyer = Uuid::new_v4();
  let voucher = h.add_voucher(15, 250).await;

  let err = h.account.redeem_voucher(buyer, voucher.id).await.unwrap_err();
  assert!(matches!(
    err,
    CommitError::InsufficientPoints {
      balance: 0,
      required: 250,
      ..
    }
  ));

  h.admin.grant_points(buyer, 300).await.unwrap();
  let owned = h.account.redeem_voucher(buyer, voucher.id).await.unwrap();
  assert!(owned.is_redeemable());
  assert_eq!(h.account.points(buyer).await.unwrap(), 50);

  let mine = h.account.my_vouchers(buyer).await.unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0].voucher.id, voucher.id);
  assert_eq!(mine[0].user_voucher.id, owned.id);

  assert!(matches!(
    h.account.redeem_voucher(buyer, Uuid::new_v4()).await,
    Err(CommitError::NotFound(_))
  ));
}

#[tokio::test]
#[serial]
async fn toggling_requires_ownership() {
  setup_tracing();
  let h = Harness::new();
  let owner = Uuid::new_v4();
  let voucher = h.give_voucher(owner, 10).await;

  let err = h
    .account
    .set_voucher_active(Uuid::new_v4(), voucher.id, false)
    .await
    .unwrap_err();
  assert!(matches!(err, CommitError::VoucherNotOwned { .. }));
  assert!(h.store.user_voucher(voucher.id).await.unwrap().is_active);
}
