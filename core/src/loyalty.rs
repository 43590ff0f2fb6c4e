// core/src/loyalty.rs

//! Loyalty points: per-item sustainability scoring and the points ledger.
//!
//! Scores come from an external scorer and are best-effort: a missing score,
//! a scorer error or a timeout all fall back to the neutral score. Scoring
//! never blocks or fails a commit.

use crate::error::{CommitError, CommitResult};
use crate::models::{CartLine, ItemKind};
use crate::store::StoreTx;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

#[async_trait]
pub trait SustainabilityScorer: Send + Sync {
  /// Score of an item, or `None` if it has not been scored yet.
  async fn score(&self, item_kind: ItemKind, item_id: Uuid) -> anyhow::Result<Option<i64>>;
}

/// Scorer that knows nothing; every item gets the neutral score.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralScorer;

#[async_trait]
impl SustainabilityScorer for NeutralScorer {
  async fn score(&self, _item_kind: ItemKind, _item_id: Uuid) -> anyhow::Result<Option<i64>> {
    Ok(None)
  }
}

/// Scores held in memory, filled in as the external annotator reports them.
#[derive(Debug, Default)]
pub struct StaticScorer {
  scores: RwLock<HashMap<Uuid, i64>>,
}

impl StaticScorer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&self, item_id: Uuid, score: i64) {
    self.scores.write().insert(item_id, score);
  }
}

#[async_trait]
impl SustainabilityScorer for StaticScorer {
  async fn score(&self, _item_kind: ItemKind, item_id: Uuid) -> anyhow::Result<Option<i64>> {
    Ok(self.scores.read().get(&item_id).copied())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoyaltyPolicy {
  pub neutral_item_points: i64,
  pub min_score: i64,
  pub max_score: i64,
  pub scorer_timeout: Duration,
}

impl Default for LoyaltyPolicy {
  fn default() -> Self {
    Self {
      neutral_item_points: 5,
      min_score: 1,
      max_score: 10,
      scorer_timeout: Duration::from_millis(250),
    }
  }
}

/// Points earned by a cart: clamped score times quantity, summed over lines.
#[instrument(name = "loyalty::points_for", skip_all, fields(line_count = lines.len()))]
pub async fn points_for(scorer: &dyn SustainabilityScorer, lines: &[CartLine], policy: &LoyaltyPolicy) -> i64 {
  let mut total = 0;
  for line in lines {
    let score = match tokio::time::timeout(policy.scorer_timeout, scorer.score(line.item_kind, line.item_id)).await {
      Ok(Ok(Some(score))) => score.clamp(policy.min_score, policy.max_score),
      Ok(Ok(None)) => policy.neutral_item_points,
      Ok(Err(err)) => {
        warn!(item_id = %line.item_id, error = %err, "Scorer failed, using neutral score.");
        policy.neutral_item_points
      }
      Err(_) => {
        warn!(item_id = %line.item_id, "Scorer timed out, using neutral score.");
        policy.neutral_item_points
      }
    };
    total += score * i64::from(line.quantity);
  }
  debug!(points = total, "Cart scored.");
  total
}

/// Credits `points` to a user. Returns the new balance.
pub async fn accrue(tx: &mut dyn StoreTx, user_id: Uuid, points: i64) -> CommitResult<i64> {
  let balance = tx.lock_points(user_id).await?;
  if points <= 0 {
    return Ok(balance);
  }
  let balance = balance + points;
  tx.set_points(user_id, balance).await?;
  Ok(balance)
}

/// Debits `cost` points. Fails with `InsufficientPoints` when the balance is short.
pub async fn debit(tx: &mut dyn StoreTx, user_id: Uuid, cost: i64) -> CommitResult<i64> {
  let balance = tx.lock_points(user_id).await?;
  if balance < cost {
    return Err(CommitError::InsufficientPoints {
      user_id,
      balance,
      required: cost,
    });
  }
  let balance = balance - cost.max(0);
  tx.set_points(user_id, balance).await?;
  Ok(balance)
}
