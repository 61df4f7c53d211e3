use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::{require_positive, require_text, WorkflowError, WorkflowResult};
use crate::identity::ProfileId;
use crate::quotation::QuotationId;
use crate::rfq::RfqId;

crate::define_id!(
    /// Unique sample request identifier.
    SampleRequestId
);

crate::define_id!(
    /// Unique sample quote identifier.
    SampleQuoteId
);

/// Lifecycle of a physical sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    #[serde(alias = "requested")]
    PendingAdminReview,
    ApprovedByAdmin,
    ShippedBySupplier,
    #[serde(alias = "delivered")]
    DeliveredToBuyer,
    Rejected,
}

impl SampleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleStatus::PendingAdminReview => "pending_admin_review",
            SampleStatus::ApprovedByAdmin => "approved_by_admin",
            SampleStatus::ShippedBySupplier => "shipped_by_supplier",
            SampleStatus::DeliveredToBuyer => "delivered_to_buyer",
            SampleStatus::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(self, next: SampleStatus) -> bool {
        use SampleStatus::*;
        matches!(
            (self, next),
            (PendingAdminReview, ApprovedByAdmin)
                | (PendingAdminReview, Rejected)
                | (ApprovedByAdmin, ShippedBySupplier)
                | (ShippedBySupplier, DeliveredToBuyer)
        )
    }

    pub fn transition(self, next: SampleStatus) -> WorkflowResult<SampleStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WorkflowError::invalid_transition("sample request", self, next))
        }
    }

    /// True once courier details exist.
    pub fn has_shipped(self) -> bool {
        matches!(
            self,
            SampleStatus::ShippedBySupplier | SampleStatus::DeliveredToBuyer
        )
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Courier details, populated only at the shipped transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub courier_service: String,
    pub tracking_number: String,
    pub shipped_at: DateTime<Utc>,
}

/// A buyer's request for a physical sample of a quoted product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRequest {
    pub id: SampleRequestId,
    pub rfq_id: RfqId,
    pub quotation_id: QuotationId,
    pub buyer_id: ProfileId,
    pub supplier_id: ProfileId,
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: SampleStatus,
    #[serde(default)]
    pub shipment: Option<Shipment>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSampleRequest {
    #[serde(default = "default_sample_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_sample_quantity() -> u32 {
    1
}

impl SampleRequest {
    pub fn new(
        input: NewSampleRequest,
        rfq_id: RfqId,
        quotation_id: QuotationId,
        buyer_id: ProfileId,
        supplier_id: ProfileId,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Self> {
        require_positive("quantity", input.quantity.into())?;
        Ok(Self {
            id: SampleRequestId::new(),
            rfq_id,
            quotation_id,
            buyer_id,
            supplier_id,
            quantity: input.quantity,
            notes: input.notes,
            status: SampleStatus::PendingAdminReview,
            shipment: None,
            rejection_reason: None,
            approved_at: None,
            delivered_at: None,
            rejected_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Courier details a supplier attaches when dispatching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipSample {
    pub courier_service: String,
    pub tracking_number: String,
}

impl ShipSample {
    pub fn into_shipment(self, now: DateTime<Utc>) -> WorkflowResult<Shipment> {
        require_text("courier_service", &self.courier_service)?;
        require_text("tracking_number", &self.tracking_number)?;
        Ok(Shipment {
            courier_service: self.courier_service.trim().to_string(),
            tracking_number: self.tracking_number.trim().to_string(),
            shipped_at: now,
        })
    }
}

/// A supplier's price for producing and shipping a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleQuote {
    pub id: SampleQuoteId,
    pub sample_request_id: SampleRequestId,
    pub supplier_id: ProfileId,
    pub sample_price_cents: u64,
    pub shipping_cost_cents: u64,
    pub total_cost_cents: u64,
    #[serde(default)]
    pub currency: Currency,
    pub delivery_days: u32,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSampleQuote {
    pub sample_price_cents: u64,
    #[serde(default)]
    pub shipping_cost_cents: u64,
    pub delivery_days: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewSampleQuote {
    pub fn into_quote(
        self,
        sample_request_id: SampleRequestId,
        supplier_id: ProfileId,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> WorkflowResult<SampleQuote> {
        require_positive("delivery_days", self.delivery_days.into())?;
        let total_cost_cents = self
            .sample_price_cents
            .checked_add(self.shipping_cost_cents)
            .ok_or_else(|| WorkflowError::validation("shipping_cost_cents", "total is too large"))?;
        Ok(SampleQuote {
            id: SampleQuoteId::new(),
            sample_request_id,
            supplier_id,
            sample_price_cents: self.sample_price_cents,
            shipping_cost_cents: self.shipping_cost_cents,
            total_cost_cents,
            currency,
            delivery_days: self.delivery_days,
            notes: self.notes,
            created_at: now,
        })
    }
}
