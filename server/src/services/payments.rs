// server/src/services/payments.rs

//! Builds the provider registry for the configured payment mode and holds
//! the HTTP plumbing shared by the live adapters.

use crate::config::{AppConfig, PaymentMode};
use crate::errors::{AppError, Result as AppResult};
use crate::services::card_gateway::HttpCardProvider;
use crate::services::wallet_gateway::HttpWalletProvider;
use marketplace_commit::payment::{MockCardProvider, MockWalletProvider};
use marketplace_commit::{PaymentError, PaymentGateways, PaymentProviderKind};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// In-process providers, kept so the mock approval webhook can reach them.
#[derive(Clone, Default)]
pub struct MockProviders {
  pub card: Arc<MockCardProvider>,
  pub wallet: Arc<MockWalletProvider>,
}

pub struct PaymentSetup {
  pub gateways: PaymentGateways,
  pub mocks: Option<MockProviders>,
}

pub fn build_gateways(config: &AppConfig) -> AppResult<PaymentSetup> {
  match config.payment_mode {
    PaymentMode::Mock => {
      let mocks = MockProviders::default();
      let gateways = PaymentGateways::new()
        .with_provider(mocks.card.clone())
        .with_provider(mocks.wallet.clone());
      tracing::info!("Using in-process mock payment providers.");
      Ok(PaymentSetup {
        gateways,
        mocks: Some(mocks),
      })
    }
    PaymentMode::Live => {
      let client = http_client(config.provider_timeout)?;
      let mut gateways = PaymentGateways::new();
      if let Some(card) = &config.card_api {
        gateways = gateways.with_provider(Arc::new(HttpCardProvider::new(client.clone(), card.clone())));
        tracing::info!(base_url = %card.base_url, "Card provider configured.");
      }
      if let Some(wallet) = &config.wallet_api {
        gateways = gateways.with_provider(Arc::new(HttpWalletProvider::new(client.clone(), wallet.clone())));
        tracing::info!(base_url = %wallet.base_url, "Wallet provider configured.");
      }
      Ok(PaymentSetup { gateways, mocks: None })
    }
  }
}

pub fn http_client(timeout: Duration) -> AppResult<reqwest::Client> {
  reqwest::Client::builder()
    .timeout(timeout)
    .build()
    .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Maps a transport failure. A request that may have reached the provider
/// before failing is ambiguous when it moves money.
pub(crate) fn transport_error(
  provider: PaymentProviderKind,
  reference: Option<&str>,
  err: reqwest::Error,
) -> PaymentError {
  match reference {
    Some(reference) if !err.is_connect() => PaymentError::Indeterminate {
      provider,
      reference: reference.to_string(),
      message: err.to_string(),
    },
    _ => PaymentError::ProviderUnavailable {
      provider,
      message: err.to_string(),
    },
  }
}

/// Maps a non-success HTTP status of a provider response.
pub(crate) fn status_error(
  provider: PaymentProviderKind,
  reference: Option<&str>,
  status: StatusCode,
  body: &str,
) -> PaymentError {
  if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
    return match reference {
      Some(reference) => PaymentError::Indeterminate {
        provider,
        reference: reference.to_string(),
        message: format!("provider answered {}", status),
      },
      None => PaymentError::ProviderUnavailable {
        provider,
        message: format!("provider answered {}", status),
      },
    };
  }
  if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
    return PaymentError::ProviderUnavailable {
      provider,
      message: format!("provider rejected our credentials ({})", status),
    };
  }
  PaymentError::Declined {
    provider,
    reason: format!("{}: {}", status, body.chars().take(200).collect::<String>()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn server_errors_on_money_moving_calls_are_indeterminate() {
    let err = status_error(
      PaymentProviderKind::Wallet,
      Some("ORDER-1"),
      StatusCode::BAD_GATEWAY,
      "",
    );
    assert!(matches!(err, PaymentError::Indeterminate { .. }));

    let err = status_error(PaymentProviderKind::Card, None, StatusCode::SERVICE_UNAVAILABLE, "");
    assert!(err.is_retryable());
  }

  #[test]
  fn client_errors_are_declines() {
    let err = status_error(
      PaymentProviderKind::Card,
      None,
      StatusCode::PAYMENT_REQUIRED,
      "{\"error\":\"card_declined\"}",
    );
    match err {
      PaymentError::Declined { reason, .. } => assert!(reason.contains("card_declined")),
      other => panic!("unexpected {:?}", other),
    }
  }
}
