// server/src/web/handlers/subscription_handlers.rs

//! WebSocket endpoint for live order status.
//!
//! The client sends `{"type":"SUBSCRIBE_TO_ORDER","orderId":"..."}` for each
//! order it tracks; the server answers with the current status and then
//! forwards every `ORDER_STATUS_UPDATE` / `REVIEW_SUBMITTED` event published
//! for that order. Subscriptions end with `UNSUBSCRIBE_FROM_ORDER` or when
//! the socket closes.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Message, Session};
use futures_util::StreamExt;
use marketplace_commit::{CommitError, OrderEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
  #[serde(rename_all = "camelCase")]
  SubscribeToOrder { order_id: Uuid },
  #[serde(rename_all = "camelCase")]
  UnsubscribeFromOrder { order_id: Uuid },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerNotice {
  #[serde(rename_all = "camelCase")]
  Subscribed { order_id: Uuid },
  #[serde(rename_all = "camelCase")]
  Unsubscribed { order_id: Uuid },
  Error { message: String },
}

async fn send_json<T: Serialize>(session: &mut Session, value: &T) -> bool {
  match serde_json::to_string(value) {
    Ok(text) => session.text(text).await.is_ok(),
    Err(e) => {
      warn!(error = %e, "Failed to encode WebSocket message.");
      true
    }
  }
}

/// Forwards one order's events to the socket until either side goes away.
fn forward_events(app_state: &AppState, order_id: Uuid, session: Session) -> JoinHandle<()> {
  let mut subscription = app_state.broadcaster.subscribe(order_id);
  let mut session = session;
  actix_web::rt::spawn(async move {
    while let Some(event) = subscription.recv().await {
      if !send_json(&mut session, &event).await {
        debug!(%order_id, "Socket closed; dropping subscription.");
        break;
      }
    }
  })
}

struct Connection {
  app_state: web::Data<AppState>,
  user_id: Uuid,
  session: Session,
  forwards: HashMap<Uuid, JoinHandle<()>>,
}

impl Connection {
  async fn subscribe(&mut self, order_id: Uuid) -> bool {
    let details = match self.app_state.account.order_details(self.user_id, order_id).await {
      Ok(details) => details,
      Err(CommitError::NotFound(message)) => {
        return send_json(&mut self.session, &ServerNotice::Error { message }).await;
      }
      Err(e) => {
        warn!(error = %e, %order_id, "Subscription lookup failed.");
        return send_json(
          &mut self.session,
          &ServerNotice::Error {
            message: "Order status is unavailable right now.".to_string(),
          },
        )
        .await;
      }
    };

    if !self.forwards.contains_key(&order_id) {
      let handle = forward_events(&self.app_state, order_id, self.session.clone());
      self.forwards.insert(order_id, handle);
      info!(user_id = %self.user_id, %order_id, "Subscribed to order status.");
    }
    send_json(&mut self.session, &ServerNotice::Subscribed { order_id }).await
      && send_json(&mut self.session, &OrderEvent::status(&details.order)).await
  }

  async fn unsubscribe(&mut self, order_id: Uuid) -> bool {
    if let Some(handle) = self.forwards.remove(&order_id) {
      handle.abort();
    }
    send_json(&mut self.session, &ServerNotice::Unsubscribed { order_id }).await
  }

  async fn handle_text(&mut self, text: &str) -> bool {
    match serde_json::from_str::<ClientMessage>(text) {
      Ok(ClientMessage::SubscribeToOrder { order_id }) => self.subscribe(order_id).await,
      Ok(ClientMessage::UnsubscribeFromOrder { order_id }) => self.unsubscribe(order_id).await,
      Err(e) => {
        send_json(
          &mut self.session,
          &ServerNotice::Error {
            message: format!("Unrecognised message: {}", e),
          },
        )
        .await
      }
    }
  }

  fn close_subscriptions(&mut self) {
    for (_, handle) in self.forwards.drain() {
      handle.abort();
    }
  }
}

#[instrument(name = "handler::order_subscriptions", skip(app_state, req, body, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn order_subscriptions_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req: HttpRequest,
  body: web::Payload,
) -> Result<HttpResponse, AppError> {
  let (response, session, mut messages) =
    actix_ws::handle(&req, body).map_err(|e| AppError::Validation(format!("WebSocket upgrade failed: {}", e)))?;

  let mut connection = Connection {
    app_state,
    user_id: auth_user.user_id,
    session,
    forwards: HashMap::new(),
  };

  actix_web::rt::spawn(async move {
    while let Some(message) = messages.next().await {
      let keep_open = match message {
        Ok(Message::Text(text)) => connection.handle_text(&text).await,
        Ok(Message::Ping(bytes)) => connection.session.pong(&bytes).await.is_ok(),
        Ok(Message::Close(reason)) => {
          debug!(?reason, "Client closed the socket.");
          false
        }
        Ok(_) => true,
        Err(e) => {
          warn!(error = %e, "WebSocket protocol error.");
          false
        }
      };
      if !keep_open {
        break;
      }
    }
    connection.close_subscriptions();
    let _ = connection.session.close(None).await;
  });

  Ok(response)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_messages_use_the_browser_wire_format() {
    let order_id = Uuid::new_v4();
    let subscribe: ClientMessage =
      serde_json::from_str(&format!(r#"{{"type":"SUBSCRIBE_TO_ORDER","orderId":"{}"}}"#, order_id)).unwrap();
    assert_eq!(subscribe, ClientMessage::SubscribeToOrder { order_id });

    let unsubscribe: ClientMessage =
      serde_json::from_str(&format!(r#"{{"type":"UNSUBSCRIBE_FROM_ORDER","orderId":"{}"}}"#, order_id)).unwrap();
    assert_eq!(unsubscribe, ClientMessage::UnsubscribeFromOrder { order_id });

    assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"SUBSCRIBE_TO_ORDER"}"#).is_err());
  }

  #[test]
  fn notices_are_tagged() {
    let order_id = Uuid::nil();
    let encoded = serde_json::to_value(ServerNotice::Subscribed { order_id }).unwrap();
    assert_eq!(encoded["type"], "SUBSCRIBED");
    assert_eq!(encoded["orderId"], order_id.to_string());
  }
}
