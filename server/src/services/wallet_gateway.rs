// server/src/services/wallet_gateway.rs

//! Wallet provider over an orders/captures REST API with OAuth client
//! credentials.
//!
//! `begin` creates a provider order the buyer approves on the provider's
//! site; `finalize` captures it. The capture id is the `payment_ref`.
//! Captures carry the provider order id as request id, so a repeated capture
//! never moves money twice.

use crate::config::WalletApiConfig;
use crate::services::payments::{status_error, transport_error};
use async_trait::async_trait;
use marketplace_commit::payment::{parse_payer, PaymentProvider, PAYER_METADATA_KEY};
use marketplace_commit::{
  PaymentConfirmation, PaymentError, PaymentHandshake, PaymentProviderKind, PaymentRequest, PaymentResult,
  PaymentStatus,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const KIND: PaymentProviderKind = PaymentProviderKind::Wallet;

/// Renders cents as the provider's decimal amount string.
pub fn cents_to_decimal(cents: i64) -> String {
  let sign = if cents < 0 { "-" } else { "" };
  let abs = cents.unsigned_abs();
  format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parses a decimal amount string with at most two fraction digits.
pub fn decimal_to_cents(value: &str) -> Option<i64> {
  let (whole, fraction) = match value.trim().split_once('.') {
    Some((whole, fraction)) => (whole, fraction),
    None => (value.trim(), ""),
  };
  if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }
  let whole: i64 = whole.parse().ok()?;
  let fraction: i64 = format!("{:0<2}", fraction).parse().ok()?;
  whole.checked_mul(100)?.checked_add(fraction)
}

#[derive(Debug, Deserialize)]
struct TokenBody {
  access_token: String,
  #[serde(default = "default_token_ttl")]
  expires_in: u64,
}

fn default_token_ttl() -> u64 {
  300
}

#[derive(Debug, Deserialize)]
struct Amount {
  currency_code: String,
  value: String,
}

#[derive(Debug, Deserialize)]
struct Link {
  rel: String,
  href: String,
}

#[derive(Debug, Deserialize)]
struct Capture {
  id: String,
  status: String,
  amount: Amount,
  #[serde(default)]
  custom_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Payments {
  #[serde(default)]
  captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
  #[serde(default)]
  custom_id: Option<String>,
  #[serde(default)]
  payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct OrderBody {
  id: String,
  status: String,
  #[serde(default)]
  links: Vec<Link>,
  #[serde(default)]
  purchase_units: Vec<PurchaseUnit>,
}

impl OrderBody {
  /// The completed capture and the `custom_id` of its purchase unit.
  fn completed_capture(&self) -> Option<(&Capture, Option<&str>)> {
    self.purchase_units.iter().find_map(|unit| {
      let capture = unit
        .payments
        .as_ref()?
        .captures
        .iter()
        .find(|capture| capture.status == "COMPLETED")?;
      Some((capture, unit.custom_id.as_deref()))
    })
  }
}

/// `unit_custom_id` is used when the capture itself does not echo the payer.
fn confirmation(capture: &Capture, unit_custom_id: Option<&str>) -> PaymentResult<PaymentConfirmation> {
  let amount_cents = decimal_to_cents(&capture.amount.value).ok_or_else(|| PaymentError::Indeterminate {
    provider: KIND,
    reference: capture.id.clone(),
    message: format!("unreadable capture amount '{}'", capture.amount.value),
  })?;
  Ok(PaymentConfirmation {
    provider: KIND,
    payment_ref: capture.id.clone(),
    amount_cents,
    currency: capture.amount.currency_code.to_lowercase(),
    payer_id: parse_payer(capture.custom_id.as_deref().or(unit_custom_id)),
  })
}

fn unreadable(err: reqwest::Error) -> PaymentError {
  PaymentError::ProviderUnavailable {
    provider: KIND,
    message: format!("unreadable provider response: {}", err),
  }
}

pub struct HttpWalletProvider {
  client: reqwest::Client,
  api: WalletApiConfig,
  token: Mutex<Option<(String, Instant)>>,
}

impl HttpWalletProvider {
  pub fn new(client: reqwest::Client, api: WalletApiConfig) -> Self {
    Self {
      client,
      api,
      token: Mutex::new(None),
    }
  }

  async fn access_token(&self) -> PaymentResult<String> {
    let mut cached = self.token.lock().await;
    if let Some((token, expires_at)) = cached.as_ref() {
      if Instant::now() < *expires_at {
        return Ok(token.clone());
      }
    }

    let response = self
      .client
      .post(format!("{}/v1/oauth2/token", self.api.base_url))
      .basic_auth(&self.api.client_id, Some(&self.api.client_secret))
      .form(&[("grant_type", "client_credentials")])
      .send()
      .await
      .map_err(|e| transport_error(KIND, None, e))?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(status_error(KIND, None, status, &body));
    }
    let body = response.json::<TokenBody>().await.map_err(unreadable)?;
    // Refresh a little early so a token never expires mid-request.
    let ttl = Duration::from_secs(body.expires_in.saturating_sub(30).max(1));
    *cached = Some((body.access_token.clone(), Instant::now() + ttl));
    debug!("Wallet access token refreshed.");
    Ok(body.access_token)
  }

  async fn fetch_order(&self, order_id: &str) -> PaymentResult<OrderBody> {
    let token = self.access_token().await?;
    let response = self
      .client
      .get(format!("{}/v2/checkout/orders/{}", self.api.base_url, order_id))
      .bearer_auth(token)
      .send()
      .await
      .map_err(|e| transport_error(KIND, None, e))?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(status_error(KIND, None, status, &body));
    }
    response.json::<OrderBody>().await.map_err(unreadable)
  }
}

#[async_trait]
impl PaymentProvider for HttpWalletProvider {
  fn kind(&self) -> PaymentProviderKind {
    KIND
  }

  #[instrument(name = "wallet_gateway::begin", skip(self, request), fields(amount_cents = request.amount_cents))]
  async fn begin(&self, request: &PaymentRequest) -> PaymentResult<PaymentHandshake> {
    let token = self.access_token().await?;
    let body = json!({
      "intent": "CAPTURE",
      "purchase_units": [{
        "amount": {
          "currency_code": request.currency.to_uppercase(),
          "value": cents_to_decimal(request.amount_cents),
        },
        "custom_id": request.metadata.get(PAYER_METADATA_KEY),
      }],
    });
    let response = self
      .client
      .post(format!("{}/v2/checkout/orders", self.api.base_url))
      .bearer_auth(token)
      .json(&body)
      .send()
      .await
      .map_err(|e| transport_error(KIND, None, e))?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(%status, "Wallet provider refused to create an order.");
      return Err(status_error(KIND, None, status, &body));
    }
    let order = response.json::<OrderBody>().await.map_err(unreadable)?;
    let approve_url = order
      .links
      .iter()
      .find(|link| link.rel == "approve" || link.rel == "payer-action")
      .map(|link| link.href.clone());
    info!(provider_order_id = %order.id, "Wallet order created.");
    Ok(PaymentHandshake {
      provider: KIND,
      reference: order.id,
      client_token: None,
      approve_url,
    })
  }

  #[instrument(name = "wallet_gateway::finalize", skip(self))]
  async fn finalize(&self, reference: &str) -> PaymentResult<PaymentConfirmation> {
    let token = self.access_token().await?;
    let response = self
      .client
      .post(format!("{}/v2/checkout/orders/{}/capture", self.api.base_url, reference))
      .bearer_auth(token)
      .header("PayPal-Request-Id", reference)
      .json(&json!({}))
      .send()
      .await
      .map_err(|e| transport_error(KIND, Some(reference), e))?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      if status == StatusCode::UNPROCESSABLE_ENTITY && body.contains("ORDER_ALREADY_CAPTURED") {
        debug!(provider_order_id = %reference, "Order was captured before; reading the capture back.");
        return match self.lookup(reference).await? {
          PaymentStatus::Succeeded(confirmation) => Ok(confirmation),
          _ => Err(PaymentError::Indeterminate {
            provider: KIND,
            reference: reference.to_string(),
            message: "order reported captured but no completed capture found".to_string(),
          }),
        };
      }
      return Err(status_error(KIND, Some(reference), status, &body));
    }
    let order = response.json::<OrderBody>().await.map_err(|e| PaymentError::Indeterminate {
      provider: KIND,
      reference: reference.to_string(),
      message: format!("unreadable capture response: {}", e),
    })?;
    match order.completed_capture() {
      Some((capture, unit_custom_id)) => {
        let confirmation = confirmation(capture, unit_custom_id)?;
        info!(payment_ref = %confirmation.payment_ref, "Wallet order captured.");
        Ok(confirmation)
      }
      None => Err(PaymentError::Declined {
        provider: KIND,
        reason: format!("capture finished with order status {}", order.status),
      }),
    }
  }

  async fn lookup(&self, reference: &str) -> PaymentResult<PaymentStatus> {
    let order = self.fetch_order(reference).await?;
    if let Some((capture, unit_custom_id)) = order.completed_capture() {
      return Ok(PaymentStatus::Succeeded(confirmation(capture, unit_custom_id)?));
    }
    Ok(match order.status.as_str() {
      "VOIDED" => PaymentStatus::Failed {
        reason: "order was voided".to_string(),
      },
      _ => PaymentStatus::Pending,
    })
  }

  #[instrument(name = "wallet_gateway::verify", skip(self))]
  async fn verify(&self, payment_ref: &str) -> PaymentResult<PaymentStatus> {
    let token = self.access_token().await?;
    let response = self
      .client
      .get(format!("{}/v2/payments/captures/{}", self.api.base_url, payment_ref))
      .bearer_auth(token)
      .send()
      .await
      .map_err(|e| transport_error(KIND, None, e))?;
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      return Ok(PaymentStatus::Failed {
        reason: format!("no capture '{}' at provider", payment_ref),
      });
    }
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(status_error(KIND, None, status, &body));
    }
    let capture = response.json::<Capture>().await.map_err(unreadable)?;
    Ok(match capture.status.as_str() {
      "COMPLETED" => PaymentStatus::Succeeded(confirmation(&capture, None)?),
      "PENDING" => PaymentStatus::Pending,
      other => PaymentStatus::Failed {
        reason: format!("capture status {}", other),
      },
    })
  }
}
