// server/src/state.rs
use crate::config::AppConfig;
use crate::services::payments::{MockProviders, PaymentSetup};
use crate::services::receipts::LoggingReceiptSender;
use marketplace_commit::{
  AccountService, CheckoutService, CommerceStore, FulfillmentMachine, InventoryAdmin, OrderCommitter, StaticScorer,
  StatusBroadcaster,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub config: Arc<AppConfig>, // Share loaded config
  pub checkout: CheckoutService,
  pub account: AccountService,
  pub admin: InventoryAdmin,
  pub fulfillment: FulfillmentMachine,
  pub broadcaster: StatusBroadcaster,
  /// Sustainability scores reported by the annotator.
  pub scores: Arc<StaticScorer>,
  /// Present only when running with mock payment providers.
  pub mocks: Option<MockProviders>,
}

impl AppState {
  /// Wires the engine services over one store and one provider registry.
  pub fn new(config: Arc<AppConfig>, store: Arc<dyn CommerceStore>, payments: PaymentSetup) -> Self {
    let broadcaster = StatusBroadcaster::new();
    let scores = Arc::new(StaticScorer::new());
    let committer = OrderCommitter::new(store.clone(), payments.gateways.clone(), scores.clone(), broadcaster.clone())
      .with_receipts(Arc::new(LoggingReceiptSender::new(config.receipt_sender.clone())))
      .with_pricing(config.pricing_policy())
      .with_loyalty(config.loyalty_policy());

    Self {
      checkout: CheckoutService::new(store.clone(), payments.gateways, committer, config.currency.clone()),
      account: AccountService::new(store.clone()),
      admin: InventoryAdmin::new(store.clone()),
      fulfillment: FulfillmentMachine::new(store, broadcaster.clone()),
      broadcaster,
      scores,
      mocks: payments.mocks,
      config,
    }
  }
}
