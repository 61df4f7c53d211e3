//! RFQ sourcing marketplace service.
//!
//! Buyers post requests for quotation, an admin moderates and routes them to
//! verified suppliers, suppliers quote, and an accepted quotation becomes an
//! order. [`build_app`] wires storage, insights, auth and the HTTP router
//! together from a [`config::Config`].

pub mod alerts;
pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod files;
pub mod insights;
pub mod store;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::Router;
use thiserror::Error;

use rfqhub_common::error::WorkflowError;

use crate::api::AppState;
use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::engine::Engine;
use crate::files::LocalFileStorage;
use crate::insights::{InsightService, OpenAiCompatible};
use crate::store::{EntityStore, MemoryStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("opening store: {0}")]
    Store(#[from] StoreError),
    #[error("bootstrapping admin: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Build the full application router for `config`.
pub async fn build_app(config: &Config) -> Result<Router, StartupError> {
    let store: Arc<dyn EntityStore> = match config.snapshot_path() {
        Some(path) => Arc::new(MemoryStore::open(path).await?),
        None => {
            tracing::info!("running with an in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let insights = match &config.llm_url {
        Some(url) => {
            tracing::info!(url = %url, "insights enabled");
            let model = OpenAiCompatible::new(
                url.clone(),
                config.llm_api_key.clone(),
                config.llm_model.clone(),
            );
            InsightService::new(Arc::new(model), config.llm_timeout())
        }
        None => {
            tracing::info!("no model endpoint configured, insights use the fallback");
            InsightService::disabled()
        }
    };

    let engine = Engine::new(store, insights);

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let admin = engine.bootstrap_admin(email, password).await?;
        tracing::info!(admin_id = %admin.id, email = %admin.email, "admin profile ready");
    }

    let files_dir = config.files_dir();
    tracing::info!(dir = %files_dir.display(), "serving uploads");

    let state = Arc::new(AppState {
        engine,
        tokens: TokenIssuer::from_secret(config.jwt_secret.as_bytes(), config.token_ttl()),
        files: Arc::new(LocalFileStorage::new(files_dir, config.public_url.clone())),
    });
    Ok(api::router(state))
}
