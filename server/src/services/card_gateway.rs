// server/src/services/card_gateway.rs

//! Card provider over a payment-intents REST API.
//!
//! `begin` creates an intent and hands its client secret to the browser,
//! which confirms the card directly with the provider. The intent id is the
//! `payment_ref`.

use crate::config::CardApiConfig;
use crate::services::payments::{status_error, transport_error};
use async_trait::async_trait;
use marketplace_commit::payment::{parse_payer, PaymentProvider, PAYER_METADATA_KEY};
use marketplace_commit::{
  PaymentConfirmation, PaymentError, PaymentHandshake, PaymentProviderKind, PaymentRequest, PaymentResult,
  PaymentStatus,
};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

const KIND: PaymentProviderKind = PaymentProviderKind::Card;

#[derive(Debug, Deserialize)]
struct IntentBody {
  id: String,
  status: String,
  amount: i64,
  currency: String,
  #[serde(default)]
  client_secret: Option<String>,
  #[serde(default)]
  metadata: HashMap<String, String>,
}

impl IntentBody {
  fn payment_status(&self) -> PaymentStatus {
    match self.status.as_str() {
      "succeeded" => PaymentStatus::Succeeded(PaymentConfirmation {
        provider: KIND,
        payment_ref: self.id.clone(),
        amount_cents: self.amount,
        currency: self.currency.to_lowercase(),
        payer_id: parse_payer(self.metadata.get(PAYER_METADATA_KEY).map(String::as_str)),
      }),
      "canceled" => PaymentStatus::Failed {
        reason: "payment intent was canceled".to_string(),
      },
      // The card was refused and the intent went back to waiting for one.
      "requires_payment_method" => PaymentStatus::Failed {
        reason: "card was declined".to_string(),
      },
      _ => PaymentStatus::Pending,
    }
  }
}

pub struct HttpCardProvider {
  client: reqwest::Client,
  api: CardApiConfig,
}

impl HttpCardProvider {
  pub fn new(client: reqwest::Client, api: CardApiConfig) -> Self {
    Self { client, api }
  }

  async fn fetch_intent(&self, intent_id: &str) -> PaymentResult<IntentBody> {
    let response = self
      .client
      .get(format!("{}/v1/payment_intents/{}", self.api.base_url, intent_id))
      .basic_auth(&self.api.secret_key, None::<&str>)
      .send()
      .await
      .map_err(|e| transport_error(KIND, None, e))?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(status_error(KIND, None, status, &body));
    }
    response.json::<IntentBody>().await.map_err(|e| PaymentError::ProviderUnavailable {
      provider: KIND,
      message: format!("unreadable intent: {}", e),
    })
  }
}

#[async_trait]
impl PaymentProvider for HttpCardProvider {
  fn kind(&self) -> PaymentProviderKind {
    KIND
  }

  #[instrument(name = "card_gateway::begin", skip(self, request), fields(amount_cents = request.amount_cents))]
  async fn begin(&self, request: &PaymentRequest) -> PaymentResult<PaymentHandshake> {
    let mut form: Vec<(String, String)> = vec![
      ("amount".to_string(), request.amount_cents.to_string()),
      ("currency".to_string(), request.currency.clone()),
    ];
    for (key, value) in &request.metadata {
      form.push((format!("metadata[{}]", key), value.clone()));
    }

    let response = self
      .client
      .post(format!("{}/v1/payment_intents", self.api.base_url))
      .basic_auth(&self.api.secret_key, None::<&str>)
      .form(&form)
      .send()
      .await
      .map_err(|e| transport_error(KIND, None, e))?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(%status, "Card provider refused to create an intent.");
      return Err(status_error(KIND, None, status, &body));
    }
    let intent = response.json::<IntentBody>().await.map_err(|e| PaymentError::ProviderUnavailable {
      provider: KIND,
      message: format!("unreadable intent: {}", e),
    })?;
    info!(intent_id = %intent.id, "Card intent created.");
    Ok(PaymentHandshake {
      provider: KIND,
      reference: intent.id,
      client_token: intent.client_secret,
      approve_url: None,
    })
  }

  #[instrument(name = "card_gateway::finalize", skip(self))]
  async fn finalize(&self, reference: &str) -> PaymentResult<PaymentConfirmation> {
    match self.fetch_intent(reference).await?.payment_status() {
      PaymentStatus::Succeeded(confirmation) => Ok(confirmation),
      PaymentStatus::Failed { reason } => Err(PaymentError::Declined { provider: KIND, reason }),
      PaymentStatus::Pending => Err(PaymentError::Indeterminate {
        provider: KIND,
        reference: reference.to_string(),
        message: "intent has not been confirmed yet".to_string(),
      }),
    }
  }

  async fn lookup(&self, reference: &str) -> PaymentResult<PaymentStatus> {
    Ok(self.fetch_intent(reference).await?.payment_status())
  }

  #[instrument(name = "card_gateway::verify", skip(self))]
  async fn verify(&self, payment_ref: &str) -> PaymentResult<PaymentStatus> {
    match self.fetch_intent(payment_ref).await {
      Err(PaymentError::Declined { reason, .. }) => Ok(PaymentStatus::Failed { reason }),
      other => Ok(other?.payment_status()),
    }
  }
}
