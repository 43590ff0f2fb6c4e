// server/src/main.rs

mod config;
mod db;
mod errors;
mod models;
mod services;
mod state;
mod web;

use crate::config::{AppConfig, LogFormat};
use crate::errors::Result as AppResult;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use marketplace_commit::{CommerceStore, MemoryStore};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

fn init_tracing(format: LogFormat) {
  let builder = tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  match format {
    LogFormat::Text => builder.init(),
    LogFormat::Json => builder.json().init(),
  }
}

async fn open_store(config: &AppConfig) -> AppResult<Arc<dyn CommerceStore>> {
  match &config.database_url {
    Some(database_url) => {
      let pool = db::connect(database_url).await?;
      if config.run_migrations {
        db::migrate(&pool).await?;
      }
      Ok(Arc::new(db::PgStore::new(pool)))
    }
    None => {
      tracing::warn!("DATABASE_URL not set; using the in-memory store. Data is lost on restart.");
      Ok(Arc::new(MemoryStore::new()))
    }
  }
}

async fn build_state(config: Arc<AppConfig>) -> AppResult<AppState> {
  let store = open_store(&config).await?;
  let payments = services::payments::build_gateways(&config)?;
  let app_state = AppState::new(config.clone(), store, payments);
  if config.seed_db {
    db::seed::seed_demo_catalog(&app_state.admin).await?;
  }
  Ok(app_state)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      init_tracing(LogFormat::Text);
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };
  init_tracing(app_config.log_format);
  tracing::info!("Starting marketplace commit server...");

  let app_state = match build_state(app_config.clone()).await {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialise application state.");
      return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone())) // Share AppState with handlers
      .wrap(tracing_actix_web::TracingLogger::default()) // Actix middleware for tracing requests
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
