// core/src/lib.rs

//! Order commit and payment reconciliation engine for a marketplace that sells
//! both peer-to-peer listings and first-party stocked shop variants.
//!
//! The crate turns a cart plus a confirmed payment into exactly one order,
//! without overselling stock or spending a voucher twice, and then drives the
//! order through its fulfillment and review lifecycle.
//!
//! - [`pricing`]: pure quote computation.
//! - [`inventory`]: reservation of variant stock and listing availability.
//! - [`voucher_guard`]: single-use voucher consumption.
//! - [`payment`]: provider capability with card and wallet backends.
//! - [`commit`]: the atomic order commit.
//! - [`fulfillment`]: `Ordered → … → ReviewCompleted` state machine.
//! - [`broadcast`]: per-order status notifications.
//! - [`store`]: transactional storage seam and an in-memory backend.

pub mod account;
pub mod admin;
pub mod broadcast;
pub mod checkout;
pub mod commit;
pub mod error;
pub mod fulfillment;
pub mod inventory;
pub mod loyalty;
pub mod models;
pub mod payment;
pub mod pricing;
pub mod store;
pub mod voucher_guard;

pub use account::{AccountService, OwnedVoucher};
pub use admin::InventoryAdmin;
pub use broadcast::{OrderEvent, OrderSubscription, StatusBroadcaster};
pub use checkout::{CheckoutQuote, CheckoutService, QuoteRequest};
pub use commit::{CommitDisposition, CommitOutcome, CommitRequest, OrderCommitter, ReceiptSender};
pub use error::{CommitError, CommitResult, PaymentError, PaymentResult};
pub use fulfillment::{FulfillmentMachine, ReviewOutcome, ReviewSubmission, TransitionOutcome};
pub use loyalty::{LoyaltyPolicy, NeutralScorer, StaticScorer, SustainabilityScorer};
pub use payment::{
  PaymentConfirmation, PaymentGateways, PaymentHandshake, PaymentProvider, PaymentProviderKind, PaymentRequest,
  PaymentStatus,
};
pub use pricing::{PriceQuote, PricingPolicy};
pub use store::{CommerceStore, MemoryStore, StoreTx};
