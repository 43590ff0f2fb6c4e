// server/src/services/receipts.rs

use async_trait::async_trait;
use marketplace_commit::models::OrderDetails;
use marketplace_commit::ReceiptSender;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct SentReceipt {
  pub to_user: uuid::Uuid,
  pub from: String,
  pub subject: String,
  pub body_preview: String,
  pub message_id: String,
}

/// Renders the receipt text for an order.
pub fn render_receipt(details: &OrderDetails) -> (String, String) {
  let order = &details.order;
  let subject = format!("Your order {} is confirmed", order.id.simple());
  let mut body = String::new();
  for item in &details.items {
    body.push_str(&format!(
      "{} x{} @ {}\n",
      item.item_kind,
      item.quantity,
      format_cents(item.price_at_purchase_cents)
    ));
  }
  body.push_str(&format!("Subtotal: {}\n", format_cents(order.subtotal_cents)));
  if order.discount_cents > 0 {
    body.push_str(&format!("Discount: -{}\n", format_cents(order.discount_cents)));
  }
  body.push_str(&format!("Shipping ({}): {}\n", order.delivery_method, format_cents(order.shipping_fee_cents)));
  body.push_str(&format!("Total: {}\n", format_cents(order.total_price_cents)));
  body.push_str(&format!("Loyalty points earned: {}\n", order.points_awarded));
  (subject, body)
}

fn format_cents(cents: i64) -> String {
  format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

/// Stand-in mail transport: logs the receipt instead of sending it.
#[derive(Debug, Clone)]
pub struct LoggingReceiptSender {
  from: String,
  latency: Duration,
}

impl LoggingReceiptSender {
  pub fn new(from: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      latency: Duration::from_millis(20),
    }
  }

  pub async fn deliver(&self, details: &OrderDetails) -> anyhow::Result<SentReceipt> {
    let (subject, body) = render_receipt(details);
    tokio::time::sleep(self.latency).await; // Simulate network latency

    let message_id = format!("receipt_{}", uuid::Uuid::new_v4().simple());
    info!(
      to_user = %details.order.user_id,
      from = %self.from,
      subject = %subject,
      message_id = %message_id,
      "Receipt sent."
    );
    Ok(SentReceipt {
      to_user: details.order.user_id,
      from: self.from.clone(),
      subject,
      body_preview: body.chars().take(50).collect::<String>() + "...",
      message_id,
    })
  }
}

#[async_trait]
impl ReceiptSender for LoggingReceiptSender {
  #[instrument(name = "receipts::send", skip(self, details), fields(order_id = %details.order.id))]
  async fn send_receipt(&self, details: &OrderDetails) -> anyhow::Result<()> {
    self.deliver(details).await.map(|_| ())
  }
}
