// core/src/broadcast.rs

//! Per-order publish/subscribe for fulfillment and review notifications.
//!
//! Delivery is at-most-once and best-effort: a subscriber that falls behind
//! or reconnects misses events and must re-fetch the order. Publishing never
//! waits on subscribers.

use crate::models::{FulfillmentStage, Order};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-order channel capacity.
pub const BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
  #[serde(rename_all = "camelCase")]
  OrderStatusUpdate {
    order_id: Uuid,
    stage: FulfillmentStage,
    order: Order,
  },
  #[serde(rename_all = "camelCase")]
  ReviewSubmitted { order_id: Uuid, order_item_id: Uuid },
}

impl OrderEvent {
  pub fn status(order: &Order) -> Self {
    OrderEvent::OrderStatusUpdate {
      order_id: order.id,
      stage: order.stage(),
      order: order.clone(),
    }
  }

  pub fn order_id(&self) -> Uuid {
    match self {
      OrderEvent::OrderStatusUpdate { order_id, .. } | OrderEvent::ReviewSubmitted { order_id, .. } => *order_id,
    }
  }
}

type Channels = RwLock<HashMap<Uuid, broadcast::Sender<OrderEvent>>>;

#[derive(Debug, Clone, Default)]
pub struct StatusBroadcaster {
  channels: Arc<Channels>,
}

impl StatusBroadcaster {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe(&self, order_id: Uuid) -> OrderSubscription {
    let receiver = {
      let mut channels = self.channels.write();
      channels
        .entry(order_id)
        .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
        .subscribe()
    };
    debug!(%order_id, "Subscribed to order.");
    OrderSubscription {
      order_id,
      receiver,
      channels: Arc::downgrade(&self.channels),
    }
  }

  /// Fans `event` out to the current subscribers of its order. Returns how
  /// many received it.
  pub fn publish(&self, event: OrderEvent) -> usize {
    let order_id = event.order_id();
    let sender = self.channels.read().get(&order_id).cloned();
    let Some(sender) = sender else {
      return 0;
    };
    match sender.send(event) {
      Ok(delivered) => delivered,
      Err(_) => {
        // Every receiver is gone.
        let mut channels = self.channels.write();
        if channels.get(&order_id).is_some_and(|s| s.receiver_count() == 0) {
          channels.remove(&order_id);
        }
        0
      }
    }
  }

  pub fn subscriber_count(&self, order_id: Uuid) -> usize {
    self
      .channels
      .read()
      .get(&order_id)
      .map_or(0, |sender| sender.receiver_count())
  }

  /// Number of orders that currently have a channel.
  pub fn active_orders(&self) -> usize {
    self.channels.read().len()
  }
}

/// A live subscription to one order. Dropping it unsubscribes, and the last
/// subscription of an order removes the order's channel.
#[derive(Debug)]
pub struct OrderSubscription {
  order_id: Uuid,
  receiver: broadcast::Receiver<OrderEvent>,
  channels: Weak<Channels>,
}

impl OrderSubscription {
  pub fn order_id(&self) -> Uuid {
    self.order_id
  }

  /// Next event for this order. Events lost to lag are skipped; `None` once
  /// the broadcaster is gone.
  pub async fn recv(&mut self) -> Option<OrderEvent> {
    loop {
      match self.receiver.recv().await {
        Ok(event) => return Some(event),
        Err(broadcast::error::RecvError::Lagged(missed)) => {
          warn!(order_id = %self.order_id, missed, "Subscriber lagged, events dropped.");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }
}

impl Drop for OrderSubscription {
  fn drop(&mut self) {
    let Some(channels) = self.channels.upgrade() else {
      return;
    };
    // Subscribing takes the write lock too, so the count cannot grow meanwhile.
    let mut channels = channels.write();
    if channels
      .get(&self.order_id)
      .is_some_and(|sender| sender.receiver_count() <= 1)
    {
      channels.remove(&self.order_id);
      debug!(order_id = %self.order_id, "Last subscriber left, channel removed.");
    }
  }
}
