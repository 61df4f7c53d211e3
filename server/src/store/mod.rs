//! Entity persistence.
//!
//! The engine talks to storage only through [`EntityStore`]. Every status write
//! is a compare-and-update: the caller names the status it read, and the write
//! fails with [`StoreError::Conflict`] if someone else moved the row first.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rfqhub_common::alert::{Alert, AlertId};
use rfqhub_common::category::{Category, CategoryId};
use rfqhub_common::error::WorkflowError;
use rfqhub_common::identity::{Profile, ProfileId, SupplierDetails, VerificationStatus};
use rfqhub_common::matching::Assignment;
use rfqhub_common::order::{Order, OrderId, OrderStatus, PaymentStatus};
use rfqhub_common::quotation::{Quotation, QuotationId, QuotationStatus};
use rfqhub_common::rfq::{Rfq, RfqId, RfqStatus};
use rfqhub_common::sample::{SampleQuote, SampleRequest, SampleRequestId, SampleStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        entity: &'static str,
        id: String,
        expected: String,
        actual: String,
    },

    #[error("{entity} with this {field} already exists")]
    Duplicate { entity: &'static str, field: &'static str },

    #[error("snapshot i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format: {0}")]
    Format(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn conflict(
        entity: &'static str,
        id: impl ToString,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        StoreError::Conflict {
            entity,
            id: id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => WorkflowError::NotFound { entity, id },
            StoreError::Conflict {
                entity,
                expected,
                actual,
                ..
            } => WorkflowError::Conflict {
                entity,
                expected,
                actual,
            },
            StoreError::Duplicate { entity, field } => {
                WorkflowError::validation(field, format!("{entity} with this {field} already exists"))
            }
            other => WorkflowError::Store(other.to_string()),
        }
    }
}

/// Password material for a profile. Never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Hex-encoded random salt.
    pub salt: String,
    /// Hex-encoded Argon2id output.
    pub digest: String,
}

// ─── Filters ─────────────────────────────────────────────────────────────────
//
// Equality predicates on indexed columns. `None` matches everything.

#[derive(Debug, Clone, Default)]
pub struct RfqFilter {
    pub buyer_id: Option<ProfileId>,
    pub status: Option<RfqStatus>,
    pub category: Option<String>,
}

impl RfqFilter {
    pub fn matches(&self, rfq: &Rfq) -> bool {
        self.buyer_id.is_none_or(|b| rfq.buyer_id == b)
            && self.status.is_none_or(|s| rfq.status == s)
            && self
                .category
                .as_deref()
                .is_none_or(|c| rfq.category.eq_ignore_ascii_case(c))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuotationFilter {
    pub rfq_id: Option<RfqId>,
    pub supplier_id: Option<ProfileId>,
    pub status: Option<QuotationStatus>,
}

impl QuotationFilter {
    pub fn matches(&self, q: &Quotation) -> bool {
        self.rfq_id.is_none_or(|r| q.rfq_id == r)
            && self.supplier_id.is_none_or(|s| q.supplier_id == s)
            && self.status.is_none_or(|s| q.status == s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub buyer_id: Option<ProfileId>,
    pub supplier_id: Option<ProfileId>,
    pub rfq_id: Option<RfqId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, o: &Order) -> bool {
        self.buyer_id.is_none_or(|b| o.buyer_id == b)
            && self.supplier_id.is_none_or(|s| o.supplier_id == s)
            && self.rfq_id.is_none_or(|r| o.rfq_id == r)
            && self.status.is_none_or(|s| o.status == s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleFilter {
    pub buyer_id: Option<ProfileId>,
    pub supplier_id: Option<ProfileId>,
    pub rfq_id: Option<RfqId>,
    pub quotation_id: Option<QuotationId>,
    pub status: Option<SampleStatus>,
}

impl SampleFilter {
    pub fn matches(&self, s: &SampleRequest) -> bool {
        self.buyer_id.is_none_or(|b| s.buyer_id == b)
            && self.supplier_id.is_none_or(|v| s.supplier_id == v)
            && self.rfq_id.is_none_or(|r| s.rfq_id == r)
            && self.quotation_id.is_none_or(|q| s.quotation_id == q)
            && self.status.is_none_or(|st| s.status == st)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub rfq_id: Option<RfqId>,
    pub supplier_id: Option<ProfileId>,
}

impl AssignmentFilter {
    pub fn matches(&self, a: &Assignment) -> bool {
        self.rfq_id.is_none_or(|r| a.rfq_id == r)
            && self.supplier_id.is_none_or(|s| a.supplier_id == s)
    }
}

/// Everything written when a buyer accepts a quotation.
///
/// Applied as one unit: the RFQ and quotation must still hold their expected
/// statuses, every other live quotation on the RFQ becomes `superseded`, and the
/// order is inserted.
#[derive(Debug, Clone)]
pub struct Acceptance {
    pub rfq: Rfq,
    pub rfq_expected: RfqStatus,
    pub quotation: Quotation,
    pub quotation_expected: QuotationStatus,
    pub order: Order,
}

/// Persistence trait for all marketplace state.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // ── Profiles ──

    /// Fails with `Duplicate` if the email is already registered.
    async fn insert_profile(&self, profile: &Profile, credential: &Credential) -> StoreResult<()>;
    async fn get_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>>;
    async fn find_login(&self, email: &str) -> StoreResult<Option<(Profile, Credential)>>;

    // ── Supplier details ──

    async fn put_supplier_details(&self, details: &SupplierDetails) -> StoreResult<()>;
    async fn get_supplier_details(&self, supplier: ProfileId)
        -> StoreResult<Option<SupplierDetails>>;
    async fn list_supplier_details(
        &self,
        status: Option<VerificationStatus>,
    ) -> StoreResult<Vec<SupplierDetails>>;
    async fn update_verification(
        &self,
        supplier: ProfileId,
        expected: VerificationStatus,
        next: VerificationStatus,
    ) -> StoreResult<SupplierDetails>;

    // ── Categories ──

    async fn put_category(&self, category: &Category) -> StoreResult<()>;
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    async fn delete_category(&self, id: CategoryId) -> StoreResult<bool>;

    // ── RFQs ──

    async fn insert_rfq(&self, rfq: &Rfq) -> StoreResult<()>;
    async fn get_rfq(&self, id: RfqId) -> StoreResult<Option<Rfq>>;
    async fn find_rfqs(&self, filter: &RfqFilter) -> StoreResult<Vec<Rfq>>;
    /// Replace the stored row if its status is still `expected`.
    async fn update_rfq(&self, rfq: &Rfq, expected: RfqStatus) -> StoreResult<()>;

    // ── Assignments ──

    /// Write the RFQ (status CAS on `expected`) together with every assignment.
    /// Nothing is written if any pair already exists.
    async fn commit_assignments(
        &self,
        rfq: &Rfq,
        expected: RfqStatus,
        assignments: &[Assignment],
    ) -> StoreResult<()>;
    async fn find_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>>;

    // ── Quotations ──

    /// Write the parent RFQ (status CAS on `rfq_expected`) together with the new
    /// quotation. Fails with `Duplicate` if the supplier already has a live
    /// quotation on the RFQ; nothing is written on any failure.
    async fn commit_quotation(
        &self,
        quotation: &Quotation,
        rfq: &Rfq,
        rfq_expected: RfqStatus,
    ) -> StoreResult<()>;
    async fn get_quotation(&self, id: QuotationId) -> StoreResult<Option<Quotation>>;
    async fn find_quotations(&self, filter: &QuotationFilter) -> StoreResult<Vec<Quotation>>;
    async fn update_quotation(
        &self,
        quotation: &Quotation,
        expected: QuotationStatus,
    ) -> StoreResult<()>;

    /// Returns the ids of the quotations that were superseded.
    async fn commit_acceptance(&self, acceptance: &Acceptance) -> StoreResult<Vec<QuotationId>>;

    // ── Orders ──

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>>;
    async fn find_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>>;
    async fn update_order(
        &self,
        order: &Order,
        expected: OrderStatus,
        expected_payment: PaymentStatus,
    ) -> StoreResult<()>;

    // ── Samples ──

    async fn insert_sample(&self, sample: &SampleRequest) -> StoreResult<()>;
    async fn get_sample(&self, id: SampleRequestId) -> StoreResult<Option<SampleRequest>>;
    async fn find_samples(&self, filter: &SampleFilter) -> StoreResult<Vec<SampleRequest>>;
    async fn update_sample(&self, sample: &SampleRequest, expected: SampleStatus)
        -> StoreResult<()>;
    async fn insert_sample_quote(&self, quote: &SampleQuote) -> StoreResult<()>;
    async fn list_sample_quotes(&self, sample: SampleRequestId) -> StoreResult<Vec<SampleQuote>>;

    // ── Alerts (append-only) ──

    async fn append_alert(&self, alert: &Alert) -> StoreResult<()>;
    async fn list_alerts(&self, unread_only: bool) -> StoreResult<Vec<Alert>>;
    async fn mark_alert_read(&self, id: AlertId) -> StoreResult<bool>;
    /// Returns how many alerts changed.
    async fn mark_all_alerts_read(&self) -> StoreResult<usize>;
}
