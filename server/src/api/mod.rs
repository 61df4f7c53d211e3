//! HTTP surface of the marketplace.
//!
//! Public routes cover health, signup, login and the category list. Everything
//! else needs a bearer token; the [`authenticate`] layer turns it into an
//! [`Actor`] request extension.

mod error;
mod handlers;

pub use error::{ApiError, ErrorBody};

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rfqhub_common::error::WorkflowError;
use rfqhub_common::identity::Actor;

use crate::auth::TokenIssuer;
use crate::engine::Engine;
use crate::files::FileStorage;

pub struct AppState {
    pub engine: Engine,
    pub tokens: TokenIssuer,
    pub files: Arc<dyn FileStorage>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/signup", post(handlers::sign_up))
        .route("/auth/login", post(handlers::log_in))
        .route("/categories", get(handlers::list_categories));

    let protected = Router::new()
        .route("/me", get(handlers::me))
        // Categories and suppliers
        .route("/admin/categories", put(handlers::upsert_category))
        .route("/admin/categories/{id}", delete(handlers::delete_category))
        .route(
            "/suppliers/me/details",
            get(handlers::my_details).put(handlers::submit_details),
        )
        .route("/admin/suppliers", get(handlers::list_suppliers))
        .route("/admin/suppliers/{id}/verify", post(handlers::verify_supplier))
        // RFQs
        .route("/rfqs", post(handlers::submit_rfq).get(handlers::list_rfqs))
        .route("/rfqs/open", get(handlers::open_rfqs))
        .route("/rfqs/{id}", get(handlers::get_rfq).patch(handlers::edit_rfq))
        .route("/admin/rfqs/{id}/approve", post(handlers::approve_rfq))
        .route("/admin/rfqs/{id}/reject", post(handlers::reject_rfq))
        .route("/admin/rfqs/{id}/assign", post(handlers::assign_suppliers))
        .route("/admin/rfqs/{id}/suggestions", get(handlers::suggest_suppliers))
        .route("/rfqs/{id}/questions", post(handlers::ask_question))
        // Quotations
        .route(
            "/rfqs/{id}/quotations",
            post(handlers::submit_quotation).get(handlers::list_rfq_quotations),
        )
        .route("/quotations", get(handlers::list_quotations))
        .route("/quotations/{id}", patch(handlers::revise_quotation))
        .route("/quotations/{id}/accept", post(handlers::accept_quotation))
        .route("/admin/quotations/{id}/approve", post(handlers::approve_quotation))
        .route("/admin/quotations/{id}/reject", post(handlers::reject_quotation))
        // Samples
        .route("/quotations/{id}/samples", post(handlers::request_sample))
        .route("/samples", get(handlers::list_samples))
        .route("/samples/{id}/ship", post(handlers::ship_sample))
        .route(
            "/samples/{id}/quotes",
            post(handlers::submit_sample_quote).get(handlers::list_sample_quotes),
        )
        .route("/admin/samples/{id}/approve", post(handlers::approve_sample))
        .route("/admin/samples/{id}/reject", post(handlers::reject_sample))
        .route("/admin/samples/{id}/deliver", post(handlers::deliver_sample))
        // Orders
        .route("/orders", get(handlers::list_orders))
        .route("/orders/{id}", get(handlers::get_order))
        .route("/orders/{id}/advance", post(handlers::advance_order))
        .route("/admin/orders/{id}/payment", post(handlers::record_payment))
        // Alerts
        .route("/admin/alerts", get(handlers::list_alerts))
        .route("/admin/alerts/read-all", post(handlers::mark_all_alerts_read))
        .route("/admin/alerts/{id}/read", post(handlers::mark_alert_read))
        // Files
        .route(
            "/files/{bucket}/{*path}",
            put(handlers::upload_file).delete(handlers::remove_file),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Resolve `Authorization: Bearer <jwt>` into an [`Actor`] extension.
async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError(WorkflowError::Unauthenticated))?;
    let actor: Actor = state.tokens.verify(token.trim())?;
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
