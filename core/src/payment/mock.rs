// core/src/payment/mock.rs

//! In-process providers used by tests and `PAYMENT_MODE=mock`.
//!
//! They keep their own ledger of intents/orders so that lookups and
//! verification behave like the real APIs. Faults can be queued to simulate
//! outages and lost responses.

use crate::error::{PaymentError, PaymentResult};
use crate::payment::{
  PaymentConfirmation, PaymentHandshake, PaymentProvider, PaymentProviderKind, PaymentRequest,
  PaymentStatus,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Scripted failure for the next provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
  /// Fails before reaching the provider.
  Unavailable,
  /// The provider applies the call but the answer is lost.
  LostResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentState {
  RequiresConfirmation,
  Succeeded,
  Failed,
}

#[derive(Debug, Clone)]
struct MockIntent {
  amount_cents: i64,
  currency: String,
  payer_id: Option<Uuid>,
  state: IntentState,
}

#[derive(Debug, Default)]
struct Faults(Mutex<VecDeque<MockFault>>);

impl Faults {
  fn push(&self, fault: MockFault) {
    self.0.lock().push_back(fault);
  }

  fn next(&self) -> Option<MockFault> {
    self.0.lock().pop_front()
  }
}

fn unavailable(provider: PaymentProviderKind) -> PaymentError {
  PaymentError::ProviderUnavailable {
    provider,
    message: "simulated network timeout".to_string(),
  }
}

fn lost(provider: PaymentProviderKind, reference: &str) -> PaymentError {
  PaymentError::Indeterminate {
    provider,
    reference: reference.to_string(),
    message: "simulated lost response".to_string(),
  }
}

/// Card provider: `begin` creates an intent, the client confirms it with card
/// details out-of-band (`approve`), the intent id becomes the `payment_ref`.
#[derive(Debug, Default)]
pub struct MockCardProvider {
  intents: Mutex<HashMap<String, MockIntent>>,
  faults: Faults,
  latency: Duration,
}

impl MockCardProvider {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  pub fn inject(&self, fault: MockFault) {
    self.faults.push(fault);
  }

  /// Simulates the client confirming the intent. Amounts whose cents modulo
  /// 1000 equal 123 are declined.
  pub fn approve(&self, intent_id: &str) -> bool {
    let mut intents = self.intents.lock();
    match intents.get_mut(intent_id) {
      Some(intent) if intent.state == IntentState::RequiresConfirmation => {
        intent.state = if intent.amount_cents % 1000 == 123 {
          IntentState::Failed
        } else {
          IntentState::Succeeded
        };
        true
      }
      _ => false,
    }
  }

  /// Creates an already succeeded intent paid by `payer_id` and returns its id.
  pub fn settle(&self, payer_id: Uuid, amount_cents: i64, currency: &str) -> String {
    let id = format!("mock_pi_{}", Uuid::new_v4().simple());
    self.intents.lock().insert(
      id.clone(),
      MockIntent {
        amount_cents,
        currency: currency.to_string(),
        payer_id: Some(payer_id),
        state: IntentState::Succeeded,
      },
    );
    id
  }

  fn status_of(&self, intent_id: &str) -> PaymentResult<PaymentStatus> {
    let intents = self.intents.lock();
    let intent = intents.get(intent_id).ok_or_else(|| PaymentError::Declined {
      provider: PaymentProviderKind::Card,
      reason: format!("no such payment intent '{}'", intent_id),
    })?;
    Ok(match intent.state {
      IntentState::RequiresConfirmation => PaymentStatus::Pending,
      IntentState::Failed => PaymentStatus::Failed {
        reason: "card declined".to_string(),
      },
      IntentState::Succeeded => PaymentStatus::Succeeded(PaymentConfirmation {
        provider: PaymentProviderKind::Card,
        payment_ref: intent_id.to_string(),
        amount_cents: intent.amount_cents,
        currency: intent.currency.clone(),
        payer_id: intent.payer_id,
      }),
    })
  }

  async fn simulate_latency(&self) {
    if !self.latency.is_zero() {
      tokio::time::sleep(self.latency).await;
    }
  }
}

#[async_trait]
impl PaymentProvider for MockCardProvider {
  fn kind(&self) -> PaymentProviderKind {
    PaymentProviderKind::Card
  }

  #[instrument(name = "mock_card::begin", skip(self, request), fields(amount_cents = request.amount_cents))]
  async fn begin(&self, request: &PaymentRequest) -> PaymentResult<PaymentHandshake> {
    self.simulate_latency().await;
    if let Some(MockFault::Unavailable) = self.faults.next() {
      return Err(unavailable(PaymentProviderKind::Card));
    }
    if request.amount_cents <= 0 {
      return Err(PaymentError::Declined {
        provider: PaymentProviderKind::Card,
        reason: "amount must be greater than zero".to_string(),
      });
    }
    let id = format!("mock_pi_{}", Uuid::new_v4().simple());
    self.intents.lock().insert(
      id.clone(),
      MockIntent {
        amount_cents: request.amount_cents,
        currency: request.currency.clone(),
        payer_id: request.payer_id(),
        state: IntentState::RequiresConfirmation,
      },
    );
    info!(intent_id = %id, "Mock card intent created.");
    Ok(PaymentHandshake {
      provider: PaymentProviderKind::Card,
      client_token: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
      reference: id,
      approve_url: None,
    })
  }

  async fn finalize(&self, reference: &str) -> PaymentResult<PaymentConfirmation> {
    self.simulate_latency().await;
    match self.faults.next() {
      Some(MockFault::Unavailable) => return Err(unavailable(PaymentProviderKind::Card)),
      Some(MockFault::LostResponse) => return Err(lost(PaymentProviderKind::Card, reference)),
      None => {}
    }
    match self.status_of(reference)? {
      PaymentStatus::Succeeded(confirmation) => Ok(confirmation),
      PaymentStatus::Failed { reason } => Err(PaymentError::Declined {
        provider: PaymentProviderKind::Card,
        reason,
      }),
      PaymentStatus::Pending => Err(PaymentError::Indeterminate {
        provider: PaymentProviderKind::Card,
        reference: reference.to_string(),
        message: "intent still requires confirmation".to_string(),
      }),
    }
  }

  async fn lookup(&self, reference: &str) -> PaymentResult<PaymentStatus> {
    self.status_of(reference)
  }

  async fn verify(&self, payment_ref: &str) -> PaymentResult<PaymentStatus> {
    self.simulate_latency().await;
    if let Some(MockFault::Unavailable) = self.faults.next() {
      return Err(unavailable(PaymentProviderKind::Card));
    }
    self.status_of(payment_ref)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalletOrderState {
  Created,
  Approved,
  Completed,
}

#[derive(Debug, Clone)]
struct MockWalletOrder {
  amount_cents: i64,
  currency: String,
  payer_id: Option<Uuid>,
  state: WalletOrderState,
  capture_id: Option<String>,
}

/// Wallet provider: `begin` creates a provider order, the buyer approves it
/// at the provider (`approve`), `finalize` captures it. The capture id is the
/// `payment_ref`.
#[derive(Debug, Default)]
pub struct MockWalletProvider {
  orders: Mutex<HashMap<String, MockWalletOrder>>,
  faults: Faults,
}

impl MockWalletProvider {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn inject(&self, fault: MockFault) {
    self.faults.push(fault);
  }

  pub fn approve(&self, order_id: &str) -> bool {
    let mut orders = self.orders.lock();
    match orders.get_mut(order_id) {
      Some(order) if order.state == WalletOrderState::Created => {
        order.state = WalletOrderState::Approved;
        true
      }
      _ => false,
    }
  }

  pub fn capture_count(&self) -> usize {
    self
      .orders
      .lock()
      .values()
      .filter(|o| o.capture_id.is_some())
      .count()
  }

  fn confirmation(order: &MockWalletOrder, capture_id: &str) -> PaymentConfirmation {
    PaymentConfirmation {
      provider: PaymentProviderKind::Wallet,
      payment_ref: capture_id.to_string(),
      amount_cents: order.amount_cents,
      currency: order.currency.clone(),
      payer_id: order.payer_id,
    }
  }

  fn capture(&self, order_id: &str) -> PaymentResult<PaymentConfirmation> {
    let mut orders = self.orders.lock();
    let order = orders.get_mut(order_id).ok_or_else(|| PaymentError::Declined {
      provider: PaymentProviderKind::Wallet,
      reason: format!("no such wallet order '{}'", order_id),
    })?;
    match order.state {
      WalletOrderState::Created => Err(PaymentError::Declined {
        provider: PaymentProviderKind::Wallet,
        reason: "order has not been approved by the payer".to_string(),
      }),
      WalletOrderState::Approved => {
        let capture_id = format!("MOCKCAP-{}", Uuid::new_v4().simple());
        order.state = WalletOrderState::Completed;
        order.capture_id = Some(capture_id.clone());
        Ok(Self::confirmation(order, &capture_id))
      }
      WalletOrderState::Completed => {
        let capture_id = order.capture_id.clone().unwrap_or_default();
        Ok(Self::confirmation(order, &capture_id))
      }
    }
  }
}

#[async_trait]
impl PaymentProvider for MockWalletProvider {
  fn kind(&self) -> PaymentProviderKind {
    PaymentProviderKind::Wallet
  }

  #[instrument(name = "mock_wallet::begin", skip(self, request), fields(amount_cents = request.amount_cents))]
  async fn begin(&self, request: &PaymentRequest) -> PaymentResult<PaymentHandshake> {
    if let Some(MockFault::Unavailable) = self.faults.next() {
      return Err(unavailable(PaymentProviderKind::Wallet));
    }
    let id = format!("MOCKORDER-{}", Uuid::new_v4().simple());
    self.orders.lock().insert(
      id.clone(),
      MockWalletOrder {
        amount_cents: request.amount_cents,
        currency: request.currency.clone(),
        payer_id: request.payer_id(),
        state: WalletOrderState::Created,
        capture_id: None,
      },
    );
    info!(provider_order_id = %id, "Mock wallet order created.");
    Ok(PaymentHandshake {
      provider: PaymentProviderKind::Wallet,
      approve_url: Some(format!("https://wallet.invalid/checkoutnow?token={}", id)),
      reference: id,
      client_token: None,
    })
  }

  async fn finalize(&self, reference: &str) -> PaymentResult<PaymentConfirmation> {
    match self.faults.next() {
      Some(MockFault::Unavailable) => Err(unavailable(PaymentProviderKind::Wallet)),
      Some(MockFault::LostResponse) => {
        self.capture(reference)?;
        Err(lost(PaymentProviderKind::Wallet, reference))
      }
      None => self.capture(reference),
    }
  }

  async fn lookup(&self, reference: &str) -> PaymentResult<PaymentStatus> {
    let orders = self.orders.lock();
    let order = orders.get(reference).ok_or_else(|| PaymentError::Declined {
      provider: PaymentProviderKind::Wallet,
      reason: format!("no such wallet order '{}'", reference),
    })?;
    Ok(match (&order.state, &order.capture_id) {
      (WalletOrderState::Completed, Some(capture_id)) => {
        PaymentStatus::Succeeded(Self::confirmation(order, capture_id))
      }
      _ => PaymentStatus::Pending,
    })
  }

  async fn verify(&self, payment_ref: &str) -> PaymentResult<PaymentStatus> {
    if let Some(MockFault::Unavailable) = self.faults.next() {
      return Err(unavailable(PaymentProviderKind::Wallet));
    }
    let orders = self.orders.lock();
    let found = orders
      .values()
      .find(|o| o.capture_id.as_deref() == Some(payment_ref));
    Ok(match found {
      Some(order) => PaymentStatus::Succeeded(Self::confirmation(order, payment_ref)),
      None => PaymentStatus::Failed {
        reason: format!("no capture '{}' at provider", payment_ref),
      },
    })
  }
}
