// server/src/services/mod.rs

pub mod card_gateway;
pub mod payments;
pub mod receipts;
pub mod wallet_gateway;
