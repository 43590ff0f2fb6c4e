// tests/payment_tests.rs
mod common;

use common::*;
use marketplace_commit::models::{CartLine, DeliveryMethod};
use marketplace_commit::payment::{MockCardProvider, MockFault};
use marketplace_commit::{
  CommitDisposition, CommitError, CommitRequest, PaymentError, PaymentGateways, PaymentProviderKind, QuoteRequest,
};
use serial_test::serial;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn wallet_flow_from_quote_to_order() {
  setup_tracing();
  let h = Harness::new();
  let buyer = Uuid::new_v4();
  let variant = h.add_variant(1250, 4).await;
  let lines = vec![CartLine::variant(variant.id, 2, 1250)];

  let quoted = h
    .checkout
    .quote(
      buyer,
      QuoteRequest {
        lines: lines.clone(),
        delivery_method: DeliveryMethod::Doorstep,
        voucher_id: None,
        provider: Some(PaymentProviderKind::Wallet),
      },
    )
    .await
    .unwrap();
  assert_eq!(quoted.quote.total_cents, 3000);
  assert_eq!(h.store.variant(variant.id).await.unwrap().stock_amt, 4);
  let handshake = quoted.handshake.unwrap();
  assert!(handshake.approve_url.is_some());

  let early = h
    .checkout
    .finalize_payment(PaymentProviderKind::Wallet, &handshake.reference)
    .await
    .unwrap_err();
  assert!(matches!(early, CommitError::Payment(PaymentError::Declined { .. })));

  assert!(h.wallet.approve(&handshake.reference));
  let confirmation = h
    .checkout
    .finalize_payment(PaymentProviderKind::Wallet, &handshake.reference)
    .await
    .unwrap();
  assert_eq!(confirmation.amount_cents, 3000);
  assert_eq!(confirmation.payer_id, Some(buyer));

  let outcome = h
    .checkout
    .commit(CommitRequest {
      user_id: buyer,
      lines,
      delivery_method: DeliveryMethod::Doorstep,
      voucher_id: None,
      declared_total_cents: Some(3000),
      payment_ref: confirmation.payment_ref.clone(),
      provider: PaymentProviderKind::Wallet,
    })
    .await
    .unwrap();
  assert_eq!(outcome.disposition, CommitDisposition::Created);
  assert_eq!(outcome.order.provider, PaymentProviderKind::Wallet);
  assert_eq!(outcome.order.payment_ref, confirmation.payment_ref);
}

#[tokio::test]
#[serial]
async fn lost_capture_response_is_reconciled_without_recapturing() {
  setup_tracing();
  let h = Harness::new();
  let variant = h.add_variant(1000, 4).await;
  let handshake = h
    .checkout
    .quote(
      Uuid::new_v4(),
      QuoteRequest {
        lines: vec![CartLine::variant(variant.id, 1, 1000)],
        delivery_method: DeliveryMethod::Collection,
        voucher_id: None,
        provider: Some(PaymentProviderKind::Wallet),
      },
    )
    .await
    .unwrap()
    .handshake
    .unwrap();
  h.wallet.approve(&handshake.reference);

  h.wallet.inject(MockFault::LostResponse);
  let confirmation = h
    .checkout
    .finalize_payment(PaymentProviderKind::Wallet, &handshake.reference)
    .await
    .unwrap();
  assert_eq!(h.wallet.capture_count(), 1);

  let again = h
    .checkout
    .finalize_payment(PaymentProviderKind::Wallet, &handshake.reference)
    .await
    .unwrap();
  assert_eq!(again.payment_ref, confirmation.payment_ref);
  assert_eq!(h.wallet.capture_count(), 1);
}

#[tokio::test]
#[serial]
async fn unavailable_provider_is_retryable_and_leaves_no_order() {
  setup_tracing();
  let h = Harness::new();
  let variant = h.add_variant(1000, 4).await;
  let buyer = Uuid::new_v4();
  let payment_ref = h.pay(buyer, 1000);
  let req = request(
    buyer,
    vec![CartLine::variant(variant.id, 1, 1000)],
    DeliveryMethod::Collection,
    None,
    &payment_ref,
  );

  h.card.inject(MockFault::Unavailable);
  let err = h.committer.commit(req.clone()).await.unwrap_err();
  match &err {
    CommitError::Payment(payment) => assert!(payment.is_retryable()),
    other => panic!("unexpected error {:?}", other),
  }
  assert_eq!(err.code(), "PROVIDER_UNAVAILABLE");
  assert_eq!(h.store.order_count().await, 0);

  let outcome = h.committer.commit(req).await.unwrap();
  assert_eq!(outcome.disposition, CommitDisposition::Created);
}

#[tokio::test]
#[serial]
async fn missing_provider_is_reported() {
  setup_tracing();
  let gateways = PaymentGateways::new().with_provider(Arc::new(MockCardProvider::new()));
  let err = gateways
    .confirm(PaymentProviderKind::Wallet, "MOCKCAP-1")
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    PaymentError::NotConfigured {
      provider: PaymentProviderKind::Wallet
    }
  ));
  assert!(!err.is_retryable());
}

#[tokio::test]
#[serial]
async fn card_intent_is_confirmed_by_reference() {
  setup_tracing();
  let card = Arc::new(MockCardProvider::new());
  let gateways = PaymentGateways::new().with_provider(card.clone());
  let handshake = gateways
    .begin(
      PaymentProviderKind::Card,
      &marketplace_commit::PaymentRequest::new(4200, "usd").with_metadata("order", "test"),
    )
    .await
    .unwrap();
  assert!(handshake.client_token.is_some());

  let pending = gateways
    .confirm(PaymentProviderKind::Card, &handshake.reference)
    .await
    .unwrap_err();
  assert!(matches!(pending, PaymentError::Indeterminate { .. }));

  card.approve(&handshake.reference);
  let confirmation = gateways
    .finalize(PaymentProviderKind::Card, &handshake.reference)
    .await
    .unwrap();
  assert_eq!(confirmation.payment_ref, handshake.reference);
  assert_eq!(confirmation.amount_cents, 4200);
  assert_eq!(confirmation.currency, "usd");
}
