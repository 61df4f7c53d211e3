use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use rfqhub_common::alert::{Alert, AlertId};
use rfqhub_common::category::{Category, CategoryId};
use rfqhub_common::error::WorkflowError;
use rfqhub_common::identity::{
    Actor, Profile, ProfileId, SupplierDetails, SupplierDetailsInput, VerificationStatus,
};
use rfqhub_common::matching::MatchScore;
use rfqhub_common::order::{Order, OrderId, OrderStatus, PaymentStatus};
use rfqhub_common::quotation::{NewQuotation, Quotation, QuotationId, QuotationPatch, QuotationStatus};
use rfqhub_common::rfq::{NewRfq, Rfq, RfqId, RfqPatch, RfqStatus};
use rfqhub_common::sample::{
    NewSampleQuote, NewSampleRequest, SampleQuote, SampleRequest, SampleRequestId, SampleStatus,
    ShipSample,
};

use super::{ApiError, AppState};
use crate::engine::{AcceptQuotation, AdvanceOrder, CategoryInput, SignUp};
use crate::store::{OrderFilter, QuotationFilter, RfqFilter, SampleFilter};

type ApiResult<T> = Result<Json<T>, ApiError>;
type Created<T> = Result<(StatusCode, Json<T>), ApiError>;

// ─── API types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    profile: Profile,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    verified: bool,
}

#[derive(Deserialize, Default)]
pub struct ReasonRequest {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    supplier_ids: Vec<ProfileId>,
}

#[derive(Deserialize)]
pub struct QuestionRequest {
    question: String,
}

#[derive(Deserialize)]
pub struct PaymentRequest {
    payment_status: PaymentStatus,
}

#[derive(Serialize)]
pub struct UploadResponse {
    url: String,
}

#[derive(Serialize)]
pub struct RemovedResponse {
    removed: bool,
}

#[derive(Serialize)]
pub struct UpdatedResponse {
    updated: usize,
}

#[derive(Deserialize, Default)]
pub struct SupplierQuery {
    #[serde(default)]
    status: Option<VerificationStatus>,
}

#[derive(Deserialize, Default)]
pub struct RfqQuery {
    #[serde(default)]
    status: Option<RfqStatus>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct QuotationQuery {
    #[serde(default)]
    rfq_id: Option<RfqId>,
    #[serde(default)]
    status: Option<QuotationStatus>,
}

#[derive(Deserialize, Default)]
pub struct SampleQuery {
    #[serde(default)]
    rfq_id: Option<RfqId>,
    #[serde(default)]
    quotation_id: Option<QuotationId>,
    #[serde(default)]
    status: Option<SampleStatus>,
}

#[derive(Deserialize, Default)]
pub struct OrderQuery {
    #[serde(default)]
    rfq_id: Option<RfqId>,
    #[serde(default)]
    status: Option<OrderStatus>,
}

#[derive(Deserialize, Default)]
pub struct AlertQuery {
    #[serde(default)]
    unread_only: bool,
}

// ─── Auth ────────────────────────────────────────────────────────────────────

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignUp>,
) -> Created<AuthResponse> {
    let profile = state.engine.sign_up(body).await?;
    let token = state.tokens.issue(&profile)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, profile })))
}

pub async fn log_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let profile = state.engine.log_in(&body.email, &body.password).await?;
    let token = state.tokens.issue(&profile)?;
    Ok(Json(AuthResponse { token, profile }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Profile> {
    Ok(Json(state.engine.profile(&actor, actor.id).await?))
}

// ─── Categories & suppliers ──────────────────────────────────────────────────

pub async fn list_categories(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Category>> {
    Ok(Json(state.engine.list_categories().await?))
}

pub async fn upsert_category(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<CategoryInput>,
) -> ApiResult<Category> {
    Ok(Json(state.engine.upsert_category(&actor, body).await?))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_category(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_details(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<SupplierDetails> {
    Ok(Json(state.engine.supplier_details(&actor, actor.id).await?))
}

pub async fn submit_details(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<SupplierDetailsInput>,
) -> ApiResult<SupplierDetails> {
    Ok(Json(state.engine.submit_supplier_details(&actor, body).await?))
}

pub async fn list_suppliers(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<SupplierQuery>,
) -> ApiResult<Vec<SupplierDetails>> {
    Ok(Json(state.engine.list_suppliers(&actor, query.status).await?))
}

pub async fn verify_supplier(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<ProfileId>,
    Json(body): Json<VerifyRequest>,
) -> ApiResult<SupplierDetails> {
    Ok(Json(
        state.engine.verify_supplier(&actor, id, body.verified).await?,
    ))
}

// ─── RFQs ────────────────────────────────────────────────────────────────────

pub async fn submit_rfq(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<NewRfq>,
) -> Created<Rfq> {
    let rfq = state.engine.submit_rfq(&actor, body).await?;
    Ok((StatusCode::CREATED, Json(rfq)))
}

pub async fn list_rfqs(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<RfqQuery>,
) -> ApiResult<Vec<Rfq>> {
    let filter = RfqFilter {
        buyer_id: None,
        status: query.status,
        category: query.category,
    };
    Ok(Json(state.engine.list_rfqs(&actor, filter).await?))
}

pub async fn open_rfqs(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Vec<Rfq>> {
    Ok(Json(state.engine.open_rfqs(&actor).await?))
}

pub async fn get_rfq(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<RfqId>,
) -> ApiResult<Rfq> {
    Ok(Json(state.engine.get_rfq(&actor, id).await?))
}

pub async fn edit_rfq(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<RfqId>,
    Json(body): Json<RfqPatch>,
) -> ApiResult<Rfq> {
    Ok(Json(state.engine.edit_rfq(&actor, id, body).await?))
}

pub async fn approve_rfq(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<RfqId>,
) -> ApiResult<Rfq> {
    Ok(Json(state.engine.approve_rfq(&actor, id).await?))
}

pub async fn reject_rfq(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<RfqId>,
    Json(body): Json<ReasonRequest>,
) -> ApiResult<Rfq> {
    Ok(Json(state.engine.reject_rfq(&actor, id, body.reason).await?))
}

pub async fn assign_suppliers(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<RfqId>,
    Json(body): Json<AssignRequest>,
) -> ApiResult<Rfq> {
    Ok(Json(
        state
            .engine
            .assign_suppliers(&actor, id, body.supplier_ids)
            .await?,
    ))
}

pub async fn suggest_suppliers(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<RfqId>,
) -> ApiResult<Vec<MatchScore>> {
    Ok(Json(state.engine.suggest_suppliers(&actor, id).await?))
}

pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<RfqId>,
    Json(body): Json<QuestionRequest>,
) -> Result<StatusCode, ApiError> {
    state.engine.ask_question(&actor, id, &body.question).await?;
    Ok(StatusCode::ACCEPTED)
}

// ─── Quotations ──────────────────────────────────────────────────────────────

pub async fn submit_quotation(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<RfqId>,
    Json(body): Json<NewQuotation>,
) -> Created<Quotation> {
    let quotation = state.engine.submit_quotation(&actor, id, body).await?;
    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn list_rfq_quotations(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<RfqId>,
) -> ApiResult<Vec<Quotation>> {
    Ok(Json(state.engine.list_quotations_for_rfq(&actor, id).await?))
}

pub async fn list_quotations(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<QuotationQuery>,
) -> ApiResult<Vec<Quotation>> {
    let filter = QuotationFilter {
        rfq_id: query.rfq_id,
        supplier_id: None,
        status: query.status,
    };
    Ok(Json(state.engine.list_quotations(&actor, filter).await?))
}

pub async fn revise_quotation(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<QuotationId>,
    Json(body): Json<QuotationPatch>,
) -> ApiResult<Quotation> {
    Ok(Json(state.engine.revise_quotation(&actor, id, body).await?))
}

pub async fn accept_quotation(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<QuotationId>,
    Json(body): Json<AcceptQuotation>,
) -> Created<Order> {
    let order = state.engine.accept_quotation(&actor, id, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn approve_quotation(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<QuotationId>,
) -> ApiResult<Quotation> {
    Ok(Json(state.engine.approve_quotation(&actor, id).await?))
}

pub async fn reject_quotation(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<QuotationId>,
    Json(body): Json<ReasonRequest>,
) -> ApiResult<Quotation> {
    Ok(Json(
        state.engine.reject_quotation(&actor, id, body.reason).await?,
    ))
}

// ─── Samples ─────────────────────────────────────────────────────────────────

pub async fn request_sample(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<QuotationId>,
    Json(body): Json<NewSampleRequest>,
) -> Created<SampleRequest> {
    let sample = state.engine.request_sample(&actor, id, body).await?;
    Ok((StatusCode::CREATED, Json(sample)))
}

pub async fn list_samples(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<SampleQuery>,
) -> ApiResult<Vec<SampleRequest>> {
    let filter = SampleFilter {
        rfq_id: query.rfq_id,
        quotation_id: query.quotation_id,
        status: query.status,
        ..Default::default()
    };
    Ok(Json(state.engine.list_samples(&actor, filter).await?))
}

pub async fn ship_sample(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<SampleRequestId>,
    Json(body): Json<ShipSample>,
) -> ApiResult<SampleRequest> {
    Ok(Json(state.engine.ship_sample(&actor, id, body).await?))
}

pub async fn submit_sample_quote(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<SampleRequestId>,
    Json(body): Json<NewSampleQuote>,
) -> Created<SampleQuote> {
    let quote = state.engine.submit_sample_quote(&actor, id, body).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn list_sample_quotes(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<SampleRequestId>,
) -> ApiResult<Vec<SampleQuote>> {
    Ok(Json(state.engine.list_sample_quotes(&actor, id).await?))
}

pub async fn approve_sample(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<SampleRequestId>,
) -> ApiResult<SampleRequest> {
    Ok(Json(state.engine.approve_sample(&actor, id).await?))
}

pub async fn reject_sample(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<SampleRequestId>,
    Json(body): Json<ReasonRequest>,
) -> ApiResult<SampleRequest> {
    Ok(Json(state.engine.reject_sample(&actor, id, body.reason).await?))
}

pub async fn deliver_sample(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<SampleRequestId>,
) -> ApiResult<SampleRequest> {
    Ok(Json(state.engine.mark_sample_delivered(&actor, id).await?))
}

// ─── Orders ──────────────────────────────────────────────────────────────────

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Vec<Order>> {
    let filter = OrderFilter {
        rfq_id: query.rfq_id,
        status: query.status,
        ..Default::default()
    };
    Ok(Json(state.engine.list_orders(&actor, filter).await?))
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<OrderId>,
) -> ApiResult<Order> {
    Ok(Json(state.engine.get_order(&actor, id).await?))
}

pub async fn advance_order(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<OrderId>,
    Json(body): Json<AdvanceOrder>,
) -> ApiResult<Order> {
    Ok(Json(state.engine.advance_order(&actor, id, body).await?))
}

pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<OrderId>,
    Json(body): Json<PaymentRequest>,
) -> ApiResult<Order> {
    Ok(Json(
        state
            .engine
            .record_payment(&actor, id, body.payment_status)
            .await?,
    ))
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AlertQuery>,
) -> ApiResult<Vec<Alert>> {
    Ok(Json(
        state.engine.alerts().list(&actor, query.unread_only).await?,
    ))
}

pub async fn mark_alert_read(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<AlertId>,
) -> Result<StatusCode, ApiError> {
    state.engine.alerts().mark_read(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_alerts_read(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<UpdatedResponse> {
    let updated = state.engine.alerts().mark_all_read(&actor).await?;
    Ok(Json(UpdatedResponse { updated }))
}

// ─── Files ───────────────────────────────────────────────────────────────────

/// Non-admins may only write under a first path segment equal to their own id.
fn check_file_owner(actor: &Actor, path: &str) -> Result<(), ApiError> {
    if actor.is_admin() {
        return Ok(());
    }
    let owner = path.split('/').next().unwrap_or_default();
    if owner != actor.id.to_string() {
        return Err(ApiError(WorkflowError::forbidden(
            "files must be stored under your own profile id",
        )));
    }
    Ok(())
}

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path((bucket, path)): Path<(String, String)>,
    body: Bytes,
) -> Created<UploadResponse> {
    check_file_owner(&actor, &path)?;
    let url = state.files.upload(&bucket, &path, &body).await?;
    tracing::info!(%bucket, %path, size = body.len(), uploader = %actor.id, "file uploaded");
    Ok((StatusCode::CREATED, Json(UploadResponse { url })))
}

pub async fn remove_file(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path((bucket, path)): Path<(String, String)>,
) -> ApiResult<RemovedResponse> {
    check_file_owner(&actor, &path)?;
    let removed = state.files.remove(&bucket, &path).await?;
    Ok(Json(RemovedResponse { removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfqhub_common::identity::Role;

    #[test]
    fn uploads_are_scoped_to_the_uploader() {
        let supplier = Actor::new(ProfileId::new(), Role::Supplier);
        let own = format!("{}/iso9001.pdf", supplier.id);
        assert!(check_file_owner(&supplier, &own).is_ok());
        assert!(check_file_owner(&supplier, "someone-else/iso9001.pdf").is_err());

        let admin = Actor::new(ProfileId::new(), Role::Admin);
        assert!(check_file_owner(&admin, "anything/at/all.png").is_ok());
    }
}
