// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use marketplace_commit::models::{
  CartLine, DeliveryMethod, Listing, ListingStatus, OrderDetails, ShopVariant, UserVoucher, Voucher,
};
use marketplace_commit::payment::{MockCardProvider, MockWalletProvider};
use marketplace_commit::{
  AccountService, CheckoutService, CommerceStore, CommitRequest, FulfillmentMachine, InventoryAdmin, MemoryStore,
  OrderCommitter, PaymentGateways, PaymentProviderKind, ReceiptSender, StaticScorer, StatusBroadcaster,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::Level;
use uuid::Uuid;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Receipt collaborator that remembers which orders it was asked about.
#[derive(Default)]
pub struct RecordingReceipts {
  pub sent: Mutex<Vec<Uuid>>,
  pub notify: Notify,
}

#[async_trait]
impl ReceiptSender for RecordingReceipts {
  async fn send_receipt(&self, details: &OrderDetails) -> anyhow::Result<()> {
    self.sent.lock().push(details.order.id);
    self.notify.notify_one();
    Ok(())
  }
}

impl RecordingReceipts {
  pub async fn wait_for_one(&self) {
    tokio::time::timeout(Duration::from_secs(2), self.notify.notified())
      .await
      .expect("receipt was not sent in time");
  }
}

/// The whole engine wired over an in-memory store and mock providers.
pub struct Harness {
  pub store: MemoryStore,
  pub card: Arc<MockCardProvider>,
  pub wallet: Arc<MockWalletProvider>,
  pub scorer: Arc<StaticScorer>,
  pub broadcaster: StatusBroadcaster,
  pub receipts: Arc<RecordingReceipts>,
  pub committer: OrderCommitter,
  pub checkout: CheckoutService,
  pub account: AccountService,
  pub admin: InventoryAdmin,
  pub fulfillment: FulfillmentMachine,
}

impl Harness {
  pub fn new() -> Self {
    let store = MemoryStore::new();
    let shared: Arc<dyn CommerceStore> = Arc::new(store.clone());
    let card = Arc::new(MockCardProvider::new());
    let wallet = Arc::new(MockWalletProvider::new());
    let gateways = PaymentGateways::new()
      .with_provider(card.clone())
      .with_provider(wallet.clone());
    let scorer = Arc::new(StaticScorer::new());
    let broadcaster = StatusBroadcaster::new();
    let receipts = Arc::new(RecordingReceipts::default());

    let committer = OrderCommitter::new(shared.clone(), gateways.clone(), scorer.clone(), broadcaster.clone())
      .with_receipts(receipts.clone());
    let checkout = CheckoutService::new(shared.clone(), gateways, committer.clone(), "usd");

    Self {
      account: AccountService::new(shared.clone()),
      admin: InventoryAdmin::new(shared.clone()),
      fulfillment: FulfillmentMachine::new(shared, broadcaster.clone()),
      store,
      card,
      wallet,
      scorer,
      broadcaster,
      receipts,
      committer,
      checkout,
    }
  }

  pub async fn add_variant(&self, price_cents: i64, stock_amt: i64) -> ShopVariant {
    let variant = ShopVariant {
      id: Uuid::new_v4(),
      product_id: Uuid::new_v4(),
      size: "M".to_string(),
      price_cents,
      stock_amt,
    };
    self
      .admin
      .load_catalog(std::slice::from_ref(&variant), &[], &[])
      .await
      .unwrap();
    variant
  }

  pub async fn add_listing(&self, price_cents: i64, status: ListingStatus) -> Listing {
    let listing = Listing {
      id: Uuid::new_v4(),
      seller_id: Uuid::new_v4(),
      title: "Vintage denim jacket".to_string(),
      price_cents,
      status,
    };
    self
      .admin
      .load_catalog(&[], std::slice::from_ref(&listing), &[])
      .await
      .unwrap();
    listing
  }

  pub async fn add_voucher(&self, discount_percent: u8, points_cost: i64) -> Voucher {
    let voucher = Voucher {
      id: Uuid::new_v4(),
      code: format!("SAVE{}", discount_percent),
      discount_percent,
      points_cost,
    };
    self
      .admin
      .load_catalog(&[], &[], std::slice::from_ref(&voucher))
      .await
      .unwrap();
    voucher
  }

  /// Gives `user_id` an active voucher by granting and spending exactly its cost.
  pub async fn give_voucher(&self, user_id: Uuid, discount_percent: u8) -> UserVoucher {
    let voucher = self.add_voucher(discount_percent, 100).await;
    self.admin.grant_points(user_id, 100).await.unwrap();
    self.account.redeem_voucher(user_id, voucher.id).await.unwrap()
  }

  /// A settled card payment of `amount_cents` made by `payer_id`.
  pub fn pay(&self, payer_id: Uuid, amount_cents: i64) -> String {
    self.card.settle(payer_id, amount_cents, "usd")
  }
}

pub fn request(
  user_id: Uuid,
  lines: Vec<CartLine>,
  delivery_method: DeliveryMethod,
  voucher_id: Option<Uuid>,
  payment_ref: &str,
) -> CommitRequest {
  CommitRequest {
    user_id,
    lines,
    delivery_method,
    voucher_id,
    declared_total_cents: None,
    payment_ref: payment_ref.to_string(),
    provider: PaymentProviderKind::Card,
  }
}
