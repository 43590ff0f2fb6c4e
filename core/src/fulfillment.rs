// core/src/fulfillment.rs

//! Fulfillment state machine:
//! `Ordered → Shipped → Delivered → ReviewStarted → ReviewCompleted`.
//!
//! Every transition is persisted before it is broadcast, and only broadcast
//! when it actually changed the order.

use crate::broadcast::{OrderEvent, StatusBroadcaster};
use crate::error::{CommitError, CommitResult};
use crate::models::{FulfillmentStage, Order, Review};
use crate::store::{CommerceStore, StoreTx};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Applies `requested` to the timeline of `order`.
///
/// Returns `Ok(false)` when the stage was already reached. Fails with
/// `InvalidTransition` when the previous stage is missing. Entering
/// `Delivered` also enters `ReviewStarted` at the same instant.
pub fn apply_transition(order: &mut Order, requested: FulfillmentStage, now: DateTime<Utc>) -> CommitResult<bool> {
  let invalid = |order: &Order| CommitError::InvalidTransition {
    order_id: order.id,
    current: order.stage(),
    requested,
  };

  match requested {
    FulfillmentStage::Ordered => Ok(false),
    FulfillmentStage::Shipped => {
      if order.shipped_at.is_some() {
        return Ok(false);
      }
      order.shipped_at = Some(now);
      Ok(true)
    }
    FulfillmentStage::Delivered => {
      if order.delivered_at.is_some() {
        return Ok(false);
      }
      if order.shipped_at.is_none() {
        return Err(invalid(order));
      }
      order.delivered_at = Some(now);
      order.review_started_at.get_or_insert(now);
      Ok(true)
    }
    FulfillmentStage::ReviewStarted => {
      if order.review_started_at.is_some() {
        return Ok(false);
      }
      if order.delivered_at.is_none() {
        return Err(invalid(order));
      }
      order.review_started_at = Some(now);
      Ok(true)
    }
    FulfillmentStage::ReviewCompleted => {
      if order.review_completed_at.is_some() {
        return Ok(false);
      }
      if order.review_started_at.is_none() {
        return Err(invalid(order));
      }
      order.review_completed_at = Some(now);
      Ok(true)
    }
  }
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
  pub order: Order,
  /// `false` when the transition had already been applied.
  pub applied: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSubmission {
  pub order_item_id: Uuid,
  pub rating: u8,
  #[serde(default)]
  pub comment: String,
}

#[derive(Debug, Clone)]
pub struct ReviewOutcome {
  pub review: Review,
  pub order: Order,
  pub completed: bool,
}

#[derive(Clone)]
pub struct FulfillmentMachine {
  store: Arc<dyn CommerceStore>,
  broadcaster: StatusBroadcaster,
}

impl FulfillmentMachine {
  pub fn new(store: Arc<dyn CommerceStore>, broadcaster: StatusBroadcaster) -> Self {
    Self { store, broadcaster }
  }

  pub async fn mark_shipped(&self, order_id: Uuid) -> CommitResult<TransitionOutcome> {
    self.advance(order_id, FulfillmentStage::Shipped).await
  }

  pub async fn mark_delivered(&self, order_id: Uuid) -> CommitResult<TransitionOutcome> {
    self.advance(order_id, FulfillmentStage::Delivered).await
  }

  #[instrument(name = "fulfillment::advance", skip(self))]
  pub async fn advance(&self, order_id: Uuid, requested: FulfillmentStage) -> CommitResult<TransitionOutcome> {
    let mut tx = self.store.begin().await?;
    let mut order = lock_order(tx.as_mut(), order_id).await?;
    let applied = match apply_transition(&mut order, requested, Utc::now()) {
      Ok(applied) => applied,
      Err(err) => {
        warn!(error = %err, "Transition rejected.");
        tx.rollback().await?;
        return Err(err);
      }
    };
    if applied {
      tx.update_order_timeline(&order).await?;
      tx.commit().await?;
      info!(stage = %order.stage(), "Order advanced.");
      self.broadcaster.publish(OrderEvent::status(&order));
    } else {
      tx.rollback().await?;
    }
    Ok(TransitionOutcome { order, applied })
  }

  /// Records a buyer's review of one order item and completes the review
  /// stage once every item has one.
  #[instrument(name = "fulfillment::submit_review", skip(self, submission), fields(order_item_id = %submission.order_item_id))]
  pub async fn submit_review(
    &self,
    order_id: Uuid,
    user_id: Uuid,
    submission: ReviewSubmission,
  ) -> CommitResult<ReviewOutcome> {
    if !(1..=5).contains(&submission.rating) {
      return Err(CommitError::Validation("Rating must be between 1 and 5.".to_string()));
    }
    let rejected = |reason: &str| CommitError::ReviewRejected {
      order_id,
      reason: reason.to_string(),
    };

    let mut tx = self.store.begin().await?;
    let mut order = lock_order(tx.as_mut(), order_id).await?;
    if order.user_id != user_id {
      return Err(rejected("only the buyer can review this order"));
    }
    if order.stage() < FulfillmentStage::ReviewStarted {
      return Err(rejected("order has not been delivered yet"));
    }
    let items = tx.order_items(order_id).await?;
    if !items.iter().any(|item| item.id == submission.order_item_id) {
      return Err(rejected("item does not belong to this order"));
    }

    let review = Review {
      order_id,
      order_item_id: submission.order_item_id,
      user_id,
      rating: submission.rating,
      comment: submission.comment,
      submitted_at: Utc::now(),
    };
    if !tx.insert_review(&review).await? {
      return Err(rejected("item has already been reviewed"));
    }

    let completed = complete_if_all_reviewed(tx.as_mut(), &mut order).await?;
    tx.commit().await?;

    self.broadcaster.publish(OrderEvent::ReviewSubmitted {
      order_id,
      order_item_id: review.order_item_id,
    });
    if completed {
      info!("All items reviewed, review stage completed.");
      self.broadcaster.publish(OrderEvent::status(&order));
    }
    Ok(ReviewOutcome {
      review,
      order,
      completed,
    })
  }

  /// Re-evaluates review completion after a review was written by another
  /// component. Returns the order and whether this call completed it.
  #[instrument(name = "fulfillment::review_recorded", skip(self))]
  pub async fn review_recorded(&self, order_id: Uuid, order_item_id: Uuid) -> CommitResult<TransitionOutcome> {
    let mut tx = self.store.begin().await?;
    let mut order = lock_order(tx.as_mut(), order_id).await?;
    let applied = complete_if_all_reviewed(tx.as_mut(), &mut order).await?;
    tx.commit().await?;
    self.broadcaster.publish(OrderEvent::ReviewSubmitted { order_id, order_item_id });
    if applied {
      self.broadcaster.publish(OrderEvent::status(&order));
    }
    Ok(TransitionOutcome { order, applied })
  }
}

async fn lock_order(tx: &mut dyn StoreTx, order_id: Uuid) -> CommitResult<Order> {
  tx.lock_order(order_id)
    .await?
    .ok_or_else(|| CommitError::NotFound(format!("Order {} not found.", order_id)))
}

async fn complete_if_all_reviewed(tx: &mut dyn StoreTx, order: &mut Order) -> CommitResult<bool> {
  if order.review_started_at.is_none() || order.review_completed_at.is_some() {
    return Ok(false);
  }
  let items = tx.order_items(order.id).await?;
  let reviewed: HashSet<Uuid> = tx.reviewed_items(order.id).await?.into_iter().collect();
  if items.is_empty() || !items.iter().all(|item| reviewed.contains(&item.id)) {
    return Ok(false);
  }
  let applied = apply_transition(order, FulfillmentStage::ReviewCompleted, Utc::now())?;
  if applied {
    tx.update_order_timeline(order).await?;
  }
  Ok(applied)
}
