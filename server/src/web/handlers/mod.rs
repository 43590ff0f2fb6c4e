// server/src/web/handlers/mod.rs

pub mod checkout_handlers;
pub mod order_handlers;
pub mod staff_handlers;
pub mod subscription_handlers;
pub mod voucher_handlers;
pub mod webhook_handlers;
