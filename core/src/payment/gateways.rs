// core/src/payment/gateways.rs

use crate::error::{PaymentError, PaymentResult};
use crate::payment::{
  PaymentConfirmation, PaymentHandshake, PaymentProvider, PaymentProviderKind, PaymentRequest,
  PaymentStatus,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Registry of the configured providers, one per kind.
///
/// Payment calls are never retried here. An indeterminate outcome is resolved
/// by querying the provider once; if that still does not settle it, the
/// indeterminate error is surfaced to the caller.
#[derive(Clone, Default)]
pub struct PaymentGateways {
  card: Option<Arc<dyn PaymentProvider>>,
  wallet: Option<Arc<dyn PaymentProvider>>,
}

impl PaymentGateways {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
    match provider.kind() {
      PaymentProviderKind::Card => self.card = Some(provider),
      PaymentProviderKind::Wallet => self.wallet = Some(provider),
    }
    self
  }

  pub fn provider(&self, kind: PaymentProviderKind) -> PaymentResult<&Arc<dyn PaymentProvider>> {
    let slot = match kind {
      PaymentProviderKind::Card => self.card.as_ref(),
      PaymentProviderKind::Wallet => self.wallet.as_ref(),
    };
    slot.ok_or(PaymentError::NotConfigured { provider: kind })
  }

  #[instrument(name = "payment::begin", skip(self, request), fields(amount_cents = request.amount_cents))]
  pub async fn begin(
    &self,
    kind: PaymentProviderKind,
    request: &PaymentRequest,
  ) -> PaymentResult<PaymentHandshake> {
    let handshake = self.provider(kind)?.begin(request).await?;
    info!(reference = %handshake.reference, "Payment opened at provider.");
    Ok(handshake)
  }

  /// Finalizes an approved payment, reconciling an indeterminate answer by
  /// looking the reference up once.
  #[instrument(name = "payment::finalize", skip(self))]
  pub async fn finalize(
    &self,
    kind: PaymentProviderKind,
    reference: &str,
  ) -> PaymentResult<PaymentConfirmation> {
    let provider = self.provider(kind)?;
    match provider.finalize(reference).await {
      Ok(confirmation) => Ok(confirmation),
      Err(err @ PaymentError::Indeterminate { .. }) => {
        warn!(error = %err, "Finalize outcome unknown, querying provider.");
        match provider.lookup(reference).await {
          Ok(PaymentStatus::Succeeded(confirmation)) => {
            info!(payment_ref = %confirmation.payment_ref, "Reconciled as succeeded.");
            Ok(confirmation)
          }
          Ok(PaymentStatus::Failed { reason }) => Err(PaymentError::Declined { provider: kind, reason }),
          Ok(PaymentStatus::Pending) => Err(err),
          Err(lookup_err) => {
            warn!(error = %lookup_err, "Reconciliation lookup failed.");
            Err(err)
          }
        }
      }
      Err(err) => Err(err),
    }
  }

  /// Confirms that `payment_ref` is a settled payment at `kind`.
  #[instrument(name = "payment::confirm", skip(self))]
  pub async fn confirm(
    &self,
    kind: PaymentProviderKind,
    payment_ref: &str,
  ) -> PaymentResult<PaymentConfirmation> {
    match self.provider(kind)?.verify(payment_ref).await? {
      PaymentStatus::Succeeded(confirmation) => Ok(confirmation),
      PaymentStatus::Failed { reason } => Err(PaymentError::Declined { provider: kind, reason }),
      PaymentStatus::Pending => Err(PaymentError::Indeterminate {
        provider: kind,
        reference: payment_ref.to_string(),
        message: "payment has not completed at the provider".to_string(),
      }),
    }
  }
}

impl std::fmt::Debug for PaymentGateways {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PaymentGateways")
      .field("card", &self.card.is_some())
      .field("wallet", &self.wallet.is_some())
      .finish()
  }
}
