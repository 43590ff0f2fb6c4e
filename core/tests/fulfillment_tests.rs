// tests/fulfillment_tests.rs
mod common;

use common::*;
use marketplace_commit::models::{CartLine, DeliveryMethod, FulfillmentStage, ListingStatus, OrderItem};
use marketplace_commit::{CommitError, OrderEvent, OrderSubscription, ReviewSubmission};
use serial_test::serial;
use std::time::Duration;
use uuid::Uuid;

async fn committed_order(h: &Harness, buyer: Uuid) -> (Uuid, Vec<OrderItem>) {
  let variant = h.add_variant(1000, 5).await;
  let listing = h.add_listing(1500, ListingStatus::Available).await;
  let payment_ref = h.pay(buyer, 2500);
  let outcome = h
    .committer
    .commit(request(
      buyer,
      vec![CartLine::variant(variant.id, 1, 1000), CartLine::listing(listing.id, 1500)],
      DeliveryMethod::Collection,
      None,
      &payment_ref,
    ))
    .await
    .unwrap();
  (outcome.order.id, outcome.items)
}

async fn next_event(sub: &mut OrderSubscription) -> OrderEvent {
  tokio::time::timeout(Duration::from_secs(2), sub.recv())
    .await
    .expect("no event in time")
    .expect("broadcaster closed")
}

fn review(item: &OrderItem) -> ReviewSubmission {
  ReviewSubmission {
    order_item_id: item.id,
    rating: 4,
    comment: "Fits well".to_string(),
  }
}

#[tokio::test]
#[serial]
async fn delivered_requires_shipped() {
  setup_tracing();
  let h = Harness::new();
  let (order_id, _) = committed_order(&h, Uuid::new_v4()).await;

  let err = h.fulfillment.mark_delivered(order_id).await.unwrap_err();
  assert!(matches!(
    err,
    CommitError::InvalidTransition {
      current: FulfillmentStage::Ordered,
      requested: FulfillmentStage::Delivered,
      ..
    }
  ));

  let shipped = h.fulfillment.mark_shipped(order_id).await.unwrap();
  assert!(shipped.applied);
  assert_eq!(shipped.order.stage(), FulfillmentStage::Shipped);

  let again = h.fulfillment.mark_shipped(order_id).await.unwrap();
  assert!(!again.applied);
  assert_eq!(again.order.shipped_at, shipped.order.shipped_at);

  let delivered = h.fulfillment.mark_delivered(order_id).await.unwrap();
  assert_eq!(delivered.order.stage(), FulfillmentStage::ReviewStarted);
  assert_eq!(delivered.order.delivered_at, delivered.order.review_started_at);
}

#[tokio::test]
#[serial]
async fn unknown_order_is_not_found() {
  setup_tracing();
  let h = Harness::new();
  assert!(matches!(
    h.fulfillment.mark_shipped(Uuid::new_v4()).await,
    Err(CommitError::NotFound(_))
  ));
}

#[tokio::test]
#[serial]
async fn transitions_are_broadcast_only_when_applied() {
  setup_tracing();
  let h = Harness::new();
  let (order_id, _) = committed_order(&h, Uuid::new_v4()).await;
  let mut sub = h.broadcaster.subscribe(order_id);

  h.fulfillment.mark_shipped(order_id).await.unwrap();
  h.fulfillment.mark_shipped(order_id).await.unwrap();
  h.fulfillment.mark_delivered(order_id).await.unwrap();

  match next_event(&mut sub).await {
    OrderEvent::OrderStatusUpdate { stage, order, .. } => {
      assert_eq!(stage, FulfillmentStage::Shipped);
      assert!(order.shipped_at.is_some());
    }
    other => panic!("unexpected event {:?}", other),
  }
  match next_event(&mut sub).await {
    OrderEvent::OrderStatusUpdate { stage, .. } => assert_eq!(stage, FulfillmentStage::ReviewStarted),
    other => panic!("unexpected event {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn review_completes_when_every_item_is_reviewed() {
  setup_tracing();
  let h = Harness::new();
  let buyer = Uuid::new_v4();
  let (order_id, items) = committed_order(&h, buyer).await;
  h.fulfillment.mark_shipped(order_id).await.unwrap();
  h.fulfillment.mark_delivered(order_id).await.unwrap();
  let mut sub = h.broadcaster.subscribe(order_id);

  let first = h
    .fulfillment
    .submit_review(order_id, buyer, review(&items[0]))
    .await
    .unwrap();
  assert!(!first.completed);
  assert_eq!(first.order.stage(), FulfillmentStage::ReviewStarted);
  assert_eq!(
    next_event(&mut sub).await,
    OrderEvent::ReviewSubmitted {
      order_id,
      order_item_id: items[0].id
    }
  );

  let second = h
    .fulfillment
    .submit_review(order_id, buyer, review(&items[1]))
    .await
    .unwrap();
  assert!(second.completed);
  assert_eq!(second.order.stage(), FulfillmentStage::ReviewCompleted);
  assert!(matches!(next_event(&mut sub).await, OrderEvent::ReviewSubmitted { .. }));
  match next_event(&mut sub).await {
    OrderEvent::OrderStatusUpdate { stage, .. } => assert_eq!(stage, FulfillmentStage::ReviewCompleted),
    other => panic!("unexpected event {:?}", other),
  }

  let details = h.account.order_details(buyer, order_id).await.unwrap();
  assert!(details.order.review_completed_at.is_some());
}

#[tokio::test]
#[serial]
async fn reviews_are_checked() {
  setup_tracing();
  let h = Harness::new();
  let buyer = Uuid::new_v4();
  let (order_id, items) = committed_order(&h, buyer).await;

  let early = h
    .fulfillment
    .submit_review(order_id, buyer, review(&items[0]))
    .await
    .unwrap_err();
  assert!(matches!(early, CommitError::ReviewRejected { .. }));

  h.fulfillment.mark_shipped(order_id).await.unwrap();
  h.fulfillment.mark_delivered(order_id).await.unwrap();

  let stranger = h
    .fulfillment
    .submit_review(order_id, Uuid::new_v4(), review(&items[0]))
    .await
    .unwrap_err();
  assert!(matches!(stranger, CommitError::ReviewRejected { .. }));

  let foreign_item = ReviewSubmission {
    order_item_id: Uuid::new_v4(),
    rating: 5,
    comment: String::new(),
  };
  assert!(matches!(
    h.fulfillment.submit_review(order_id, buyer, foreign_item).await,
    Err(CommitError::ReviewRejected { .. })
  ));

  let bad_rating = ReviewSubmission {
    order_item_id: items[0].id,
    rating: 0,
    comment: String::new(),
  };
  assert!(matches!(
    h.fulfillment.submit_review(order_id, buyer, bad_rating).await,
    Err(CommitError::Validation(_))
  ));

  h.fulfillment
    .submit_review(order_id, buyer, review(&items[0]))
    .await
    .unwrap();
  let twice = h
    .fulfillment
    .submit_review(order_id, buyer, review(&items[0]))
    .await
    .unwrap_err();
  assert!(matches!(twice, CommitError::ReviewRejected { .. }));

  let details = h.account.order_details(buyer, order_id).await.unwrap();
  assert!(details.order.review_completed_at.is_none());
}

#[tokio::test]
#[serial]
async fn externally_recorded_review_is_observed() {
  setup_tracing();
  let h = Harness::new();
  let buyer = Uuid::new_v4();
  let (order_id, items) = committed_order(&h, buyer).await;
  h.fulfillment.mark_shipped(order_id).await.unwrap();
  h.fulfillment.mark_delivered(order_id).await.unwrap();
  h.fulfillment
    .submit_review(order_id, buyer, review(&items[0]))
    .await
    .unwrap();

  let outcome = h.fulfillment.review_recorded(order_id, items[0].id).await.unwrap();
  assert!(!outcome.applied);
  assert_eq!(outcome.order.stage(), FulfillmentStage::ReviewStarted);
}
