// server/src/web/routes.rs

use actix_web::web;

use crate::errors::AppError;
use crate::web::handlers::{
  checkout_handlers, order_handlers, staff_handlers, subscription_handlers, voucher_handlers, webhook_handlers,
};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

// Malformed bodies get the same JSON error shape as every other failure.
fn json_config() -> web::JsonConfig {
  web::JsonConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

fn path_config() -> web::PathConfig {
  web::PathConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .app_data(json_config())
      .app_data(path_config())
      .route("/health", web::get().to(health_check_handler))
      .route("/ws", web::get().to(subscription_handlers::order_subscriptions_handler))
      .service(
        web::scope("/checkout")
          .route("/quote", web::post().to(checkout_handlers::quote_handler))
          .route("/capture", web::post().to(checkout_handlers::capture_handler))
          .route("/commit", web::post().to(checkout_handlers::commit_handler)),
      )
      .service(
        web::scope("/orders")
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/reviews", web::post().to(order_handlers::submit_review_handler)),
      )
      .route("/vouchers", web::get().to(voucher_handlers::voucher_catalog_handler))
      .service(
        web::scope("/me")
          .route("/points", web::get().to(voucher_handlers::points_handler))
          .route("/vouchers", web::get().to(voucher_handlers::my_vouchers_handler))
          .route("/vouchers/redeem", web::post().to(voucher_handlers::redeem_voucher_handler))
          .route("/vouchers/{user_voucher_id}", web::patch().to(voucher_handlers::toggle_voucher_handler)),
      )
      .service(
        web::scope("/staff")
          .route("/orders/{order_id}/ship", web::post().to(staff_handlers::ship_order_handler))
          .route("/orders/{order_id}/deliver", web::post().to(staff_handlers::deliver_order_handler))
          .route("/variants/{variant_id}/restock", web::post().to(staff_handlers::restock_variant_handler))
          .route("/listings/{listing_id}/approve", web::post().to(staff_handlers::approve_listing_handler))
          .route("/items/{item_id}/score", web::put().to(staff_handlers::set_item_score_handler)),
      )
      .service(
        web::scope("/webhooks").route(
          "/mock/{provider}/{reference}/approve",
          web::post().to(webhook_handlers::mock_approval_handler),
        ),
      ),
  );
}
