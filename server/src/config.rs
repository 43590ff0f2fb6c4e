// server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use marketplace_commit::{LoyaltyPolicy, PricingPolicy};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
  /// In-process providers, no network.
  Mock,
  /// Real provider HTTP APIs.
  Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Text,
  Json,
}

#[derive(Debug, Clone)]
pub struct CardApiConfig {
  pub base_url: String,
  pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct WalletApiConfig {
  pub base_url: String,
  pub client_id: String,
  pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// Postgres connection string. Without it the in-memory store is used.
  pub database_url: Option<String>,
  pub run_migrations: bool,
  pub seed_db: bool,

  pub shipping_fee_cents: i64,
  pub price_tolerance_cents: i64,
  pub currency: String,
  pub neutral_item_points: i64,
  pub scorer_timeout: Duration,

  pub payment_mode: PaymentMode,
  pub card_api: Option<CardApiConfig>,
  pub wallet_api: Option<WalletApiConfig>,
  pub provider_timeout: Duration,

  pub staff_api_key: String,
  pub receipt_sender: String,
  pub log_format: LogFormat,
}

fn parse<T>(name: &str, raw: String) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", name, raw, e)))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from any variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let get_or = |name: &str, default: &str| get_env(name).unwrap_or_else(|| default.to_string());
    let require = |name: &str| {
      get_env(name).ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", name)))
    };

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse::<u16>("SERVER_PORT", get_or("SERVER_PORT", "8080"))?;
    let database_url = get_env("DATABASE_URL");
    let run_migrations = parse::<bool>("RUN_MIGRATIONS", get_or("RUN_MIGRATIONS", "true"))?;
    let seed_db = parse::<bool>("SEED_DB", get_or("SEED_DB", "false"))?;

    let shipping_fee_cents = parse::<i64>("SHIPPING_FEE_CENTS", get_or("SHIPPING_FEE_CENTS", "500"))?;
    let price_tolerance_cents = parse::<i64>("PRICE_TOLERANCE_CENTS", get_or("PRICE_TOLERANCE_CENTS", "1"))?;
    if shipping_fee_cents < 0 || price_tolerance_cents < 0 {
      return Err(AppError::Config(
        "SHIPPING_FEE_CENTS and PRICE_TOLERANCE_CENTS must not be negative".to_string(),
      ));
    }
    let currency = get_or("CURRENCY", "usd").to_lowercase();
    let neutral_item_points = parse::<i64>("NEUTRAL_ITEM_POINTS", get_or("NEUTRAL_ITEM_POINTS", "5"))?;
    let scorer_timeout = Duration::from_millis(parse::<u64>("SCORER_TIMEOUT_MS", get_or("SCORER_TIMEOUT_MS", "250"))?);

    let payment_mode = match get_or("PAYMENT_MODE", "mock").to_lowercase().as_str() {
      "mock" => PaymentMode::Mock,
      "live" => PaymentMode::Live,
      other => return Err(AppError::Config(format!("Invalid PAYMENT_MODE value '{}'", other))),
    };
    let card_api = match get_env("CARD_API_BASE") {
      Some(base_url) => Some(CardApiConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        secret_key: require("CARD_SECRET_KEY")?,
      }),
      None => None,
    };
    let wallet_api = match get_env("WALLET_API_BASE") {
      Some(base_url) => Some(WalletApiConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        client_id: require("WALLET_CLIENT_ID")?,
        client_secret: require("WALLET_CLIENT_SECRET")?,
      }),
      None => None,
    };
    if payment_mode == PaymentMode::Live && card_api.is_none() && wallet_api.is_none() {
      return Err(AppError::Config(
        "PAYMENT_MODE=live needs CARD_API_BASE or WALLET_API_BASE".to_string(),
      ));
    }
    let provider_timeout =
      Duration::from_millis(parse::<u64>("PROVIDER_TIMEOUT_MS", get_or("PROVIDER_TIMEOUT_MS", "10000"))?);

    let staff_api_key = get_or("STAFF_API_KEY", "staff-dev-key");
    let receipt_sender = get_or("RECEIPT_SENDER", "noreply@example.com");
    let log_format = match get_or("LOG_FORMAT", "text").to_lowercase().as_str() {
      "text" => LogFormat::Text,
      "json" => LogFormat::Json,
      other => return Err(AppError::Config(format!("Invalid LOG_FORMAT value '{}'", other))),
    };

    tracing::debug!("Application configuration loaded.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      run_migrations,
      seed_db,
      shipping_fee_cents,
      price_tolerance_cents,
      currency,
      neutral_item_points,
      scorer_timeout,
      payment_mode,
      card_api,
      wallet_api,
      provider_timeout,
      staff_api_key,
      receipt_sender,
      log_format,
    })
  }

  pub fn pricing_policy(&self) -> PricingPolicy {
    PricingPolicy {
      shipping_fee_cents: self.shipping_fee_cents,
      price_tolerance_cents: self.price_tolerance_cents,
    }
  }

  pub fn loyalty_policy(&self) -> LoyaltyPolicy {
    LoyaltyPolicy {
      neutral_item_points: self.neutral_item_points,
      scorer_timeout: self.scorer_timeout,
      ..LoyaltyPolicy::default()
    }
  }
}
