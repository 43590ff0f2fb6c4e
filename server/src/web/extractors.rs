// server/src/web/extractors.rs

use crate::errors::AppError;
use crate::state::AppState;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const STAFF_KEY_HEADER: &str = "X-Staff-Key";

/// Caller identity, taken from the `X-User-ID` header.
///
/// Browsers cannot set headers on a WebSocket upgrade, so a `user_id` query
/// parameter is accepted as a fallback.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

fn user_id_from_query(req: &HttpRequest) -> Option<Uuid> {
  req
    .query_string()
    .split('&')
    .filter_map(|pair| pair.split_once('='))
    .find(|(key, _)| *key == "user_id")
    .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let from_header = req
      .headers()
      .get(USER_ID_HEADER)
      .and_then(|value| value.to_str().ok())
      .and_then(|value| Uuid::parse_str(value.trim()).ok());
    match from_header.or_else(|| user_id_from_query(req)) {
      Some(user_id) => ready(Ok(AuthenticatedUser { user_id })),
      None => {
        warn!("AuthenticatedUser extractor: Missing or invalid X-User-ID header.");
        ready(Err(AppError::Auth(
          "User authentication required. Missing or invalid X-User-ID header.".to_string(),
        )))
      }
    }
  }
}

/// Marker for requests carrying the configured staff key.
#[derive(Debug, Clone, Copy)]
pub struct StaffUser;

impl FromRequest for StaffUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
      return ready(Err(AppError::Internal("Application state is not configured.".to_string())));
    };
    let presented = req.headers().get(STAFF_KEY_HEADER).and_then(|value| value.to_str().ok());
    if presented == Some(state.config.staff_api_key.as_str()) {
      ready(Ok(StaffUser))
    } else {
      warn!("StaffUser extractor: Missing or invalid X-Staff-Key header.");
      ready(Err(AppError::Auth("Staff key required.".to_string())))
    }
  }
}
