// core/src/models/mod.rs

//! Plain data structures shared by every component of the commit engine.
//! Storage backends map their rows into these types.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod voucher;

pub use cart::{CartLine, DeliveryMethod, ItemKind, PricedLine};
pub use catalog::{Listing, ListingStatus, ShopVariant};
pub use order::{FulfillmentStage, Order, OrderDetails, OrderItem, PaymentKey, Review};
pub use voucher::{UserVoucher, Voucher};
