// tests/broadcast_tests.rs
mod common;

use common::*;
use marketplace_commit::broadcast::BROADCAST_CAPACITY;
use marketplace_commit::models::{CartLine, DeliveryMethod, FulfillmentStage};
use marketplace_commit::{OrderEvent, StatusBroadcaster};
use serial_test::serial;
use std::time::Duration;
use uuid::Uuid;

fn review_event(order_id: Uuid) -> OrderEvent {
  OrderEvent::ReviewSubmitted {
    order_id,
    order_item_id: Uuid::new_v4(),
  }
}

#[tokio::test]
#[serial]
async fn every_subscriber_gets_every_event() {
  setup_tracing();
  let broadcaster = StatusBroadcaster::new();
  let order_id = Uuid::new_v4();
  let mut first = broadcaster.subscribe(order_id);
  let mut second = broadcaster.subscribe(order_id);
  let mut other = broadcaster.subscribe(Uuid::new_v4());
  assert_eq!(broadcaster.subscriber_count(order_id), 2);

  let event = review_event(order_id);
  assert_eq!(broadcaster.publish(event.clone()), 2);

  assert_eq!(first.recv().await, Some(event.clone()));
  assert_eq!(second.recv().await, Some(event));
  assert!(tokio::time::timeout(Duration::from_millis(50), other.recv())
    .await
    .is_err());
}

#[tokio::test]
#[serial]
async fn publishing_without_subscribers_is_harmless() {
  setup_tracing();
  let broadcaster = StatusBroadcaster::new();
  let order_id = Uuid::new_v4();
  assert_eq!(broadcaster.publish(review_event(order_id)), 0);

  let sub = broadcaster.subscribe(order_id);
  drop(sub);
  assert_eq!(broadcaster.publish(review_event(order_id)), 0);
  assert_eq!(broadcaster.subscriber_count(order_id), 0);
}

#[tokio::test]
#[serial]
async fn last_unsubscribe_frees_the_order_channel() {
  setup_tracing();
  let broadcaster = StatusBroadcaster::new();
  let order_id = Uuid::new_v4();
  let first = broadcaster.subscribe(order_id);
  let mut second = broadcaster.subscribe(order_id);
  assert_eq!(broadcaster.active_orders(), 1);

  drop(first);
  assert_eq!(broadcaster.active_orders(), 1);
  assert_eq!(broadcaster.subscriber_count(order_id), 1);
  let event = review_event(order_id);
  assert_eq!(broadcaster.publish(event.clone()), 1);
  assert_eq!(second.recv().await, Some(event));

  // No publish follows the last disconnect.
  drop(second);
  assert_eq!(broadcaster.active_orders(), 0);

  let mut again = broadcaster.subscribe(order_id);
  let event = review_event(order_id);
  assert_eq!(broadcaster.publish(event.clone()), 1);
  assert_eq!(again.recv().await, Some(event));
}

#[tokio::test]
#[serial]
async fn late_subscriber_only_sees_later_events() {
  setup_tracing();
  let broadcaster = StatusBroadcaster::new();
  let order_id = Uuid::new_v4();
  let _early = broadcaster.subscribe(order_id);
  broadcaster.publish(review_event(order_id));

  let mut late = broadcaster.subscribe(order_id);
  let fresh = review_event(order_id);
  broadcaster.publish(fresh.clone());
  assert_eq!(late.recv().await, Some(fresh));
}

#[tokio::test]
#[serial]
async fn lagging_subscriber_skips_to_newest_events() {
  setup_tracing();
  let broadcaster = StatusBroadcaster::new();
  let order_id = Uuid::new_v4();
  let mut slow = broadcaster.subscribe(order_id);

  let mut last = None;
  for _ in 0..(BROADCAST_CAPACITY + 10) {
    let event = review_event(order_id);
    broadcaster.publish(event.clone());
    last = Some(event);
  }

  let mut received = 0;
  let mut final_event = None;
  while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), slow.recv()).await {
    received += 1;
    final_event = Some(event);
  }
  assert_eq!(received, BROADCAST_CAPACITY);
  assert_eq!(final_event, last);
}

#[tokio::test]
#[serial]
async fn commit_announces_the_new_order() {
  setup_tracing();
  let h = Harness::new();
  let variant = h.add_variant(1000, 2).await;
  let buyer = Uuid::new_v4();
  let payment_ref = h.pay(buyer, 1000);
  let req = request(
    buyer,
    vec![CartLine::variant(variant.id, 1, 1000)],
    DeliveryMethod::Collection,
    None,
    &payment_ref,
  );

  // The order id is only known once committed, so only later events are observable.
  let outcome = h.committer.commit(req.clone()).await.unwrap();
  let mut sub = h.broadcaster.subscribe(outcome.order.id);
  let duplicate = h.committer.commit(req).await.unwrap();
  assert!(duplicate.is_duplicate());
  assert!(tokio::time::timeout(Duration::from_millis(50), sub.recv())
    .await
    .is_err());

  h.fulfillment.mark_shipped(outcome.order.id).await.unwrap();
  match sub.recv().await {
    Some(OrderEvent::OrderStatusUpdate { stage, .. }) => assert_eq!(stage, FulfillmentStage::Shipped),
    other => panic!("unexpected event {:?}", other),
  }
}

#[test]
fn events_serialize_to_the_client_wire_format() {
  let order_id = Uuid::nil();
  let item_id = Uuid::nil();
  let json = serde_json::to_value(OrderEvent::ReviewSubmitted {
    order_id,
    order_item_id: item_id,
  })
  .unwrap();
  assert_eq!(json["type"], "REVIEW_SUBMITTED");
  assert_eq!(json["orderId"], order_id.to_string());
  assert_eq!(json["orderItemId"], item_id.to_string());
}
