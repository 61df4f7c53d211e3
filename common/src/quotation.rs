use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::{require_positive, WorkflowError, WorkflowResult};
use crate::identity::ProfileId;
use crate::insight::QuotationAnalysis;
use crate::rfq::RfqId;

crate::define_id!(
    /// Unique quotation identifier.
    QuotationId
);

/// Longest validity window a supplier may offer.
pub const MAX_VALIDITY_DAYS: u32 = 365;

/// Moderation lifecycle of a supplier quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    /// Hidden from the buyer until an admin approves it.
    #[serde(alias = "pending_review")]
    PendingAdminReview,
    /// Visible to the buyer.
    #[serde(alias = "approved", alias = "sent_to_buyer")]
    ApprovedForBuyer,
    Rejected,
    /// Chosen by the buyer; an order exists for it.
    Accepted,
    /// Another quotation for the same RFQ was accepted.
    Superseded,
}

impl QuotationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuotationStatus::PendingAdminReview => "pending_admin_review",
            QuotationStatus::ApprovedForBuyer => "approved_for_buyer",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Superseded => "superseded",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QuotationStatus::Rejected | QuotationStatus::Accepted | QuotationStatus::Superseded
        )
    }

    /// Statuses the RFQ's buyer is allowed to read.
    pub fn is_buyer_visible(self) -> bool {
        matches!(
            self,
            QuotationStatus::ApprovedForBuyer | QuotationStatus::Accepted
        )
    }

    pub fn can_transition_to(self, next: QuotationStatus) -> bool {
        use QuotationStatus::*;
        matches!(
            (self, next),
            (PendingAdminReview, ApprovedForBuyer)
                | (PendingAdminReview, Rejected)
                | (ApprovedForBuyer, Accepted)
                | (PendingAdminReview, Superseded)
                | (ApprovedForBuyer, Superseded)
        )
    }

    pub fn transition(self, next: QuotationStatus) -> WorkflowResult<QuotationStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WorkflowError::invalid_transition("quotation", self, next))
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A supplier's priced response to an RFQ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub rfq_id: RfqId,
    pub supplier_id: ProfileId,
    pub price_per_unit_cents: u64,
    #[serde(default)]
    pub currency: Currency,
    pub moq: u64,
    pub lead_time_days: u32,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub shipping_terms: Option<String>,
    pub validity_days: u32,
    #[serde(default)]
    pub quality_guarantee: bool,
    #[serde(default)]
    pub sample_available: bool,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: QuotationStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub insight: Option<QuotationAnalysis>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn validate(&self) -> WorkflowResult<()> {
        require_positive("price_per_unit_cents", self.price_per_unit_cents)?;
        require_positive("moq", self.moq)?;
        require_positive("lead_time_days", self.lead_time_days.into())?;
        require_positive("validity_days", self.validity_days.into())?;
        if self.validity_days > MAX_VALIDITY_DAYS {
            return Err(WorkflowError::validation(
                "validity_days",
                format!("must be at most {MAX_VALIDITY_DAYS}"),
            ));
        }
        Ok(())
    }

    /// Last moment the offer may be accepted. Saturates at the end of
    /// representable time.
    pub fn valid_until(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(Duration::days(self.validity_days.into()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until()
    }
}

/// Supplier input for a new quotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuotation {
    pub price_per_unit_cents: u64,
    pub moq: u64,
    pub lead_time_days: u32,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub shipping_terms: Option<String>,
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
    #[serde(default)]
    pub quality_guarantee: bool,
    #[serde(default)]
    pub sample_available: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_validity_days() -> u32 {
    30
}

impl NewQuotation {
    /// The quotation inherits the RFQ's currency.
    pub fn into_quotation(
        self,
        rfq_id: RfqId,
        supplier_id: ProfileId,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Quotation> {
        let quotation = Quotation {
            id: QuotationId::new(),
            rfq_id,
            supplier_id,
            price_per_unit_cents: self.price_per_unit_cents,
            currency,
            moq: self.moq,
            lead_time_days: self.lead_time_days,
            payment_terms: self.payment_terms,
            shipping_terms: self.shipping_terms,
            validity_days: self.validity_days,
            quality_guarantee: self.quality_guarantee,
            sample_available: self.sample_available,
            notes: self.notes,
            status: QuotationStatus::PendingAdminReview,
            rejection_reason: None,
            insight: None,
            created_at: now,
            updated_at: now,
        };
        quotation.validate()?;
        Ok(quotation)
    }
}

/// Supplier revision of a quotation still under review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotationPatch {
    pub price_per_unit_cents: Option<u64>,
    pub moq: Option<u64>,
    pub lead_time_days: Option<u32>,
    pub payment_terms: Option<String>,
    pub shipping_terms: Option<String>,
    pub validity_days: Option<u32>,
    pub quality_guarantee: Option<bool>,
    pub sample_available: Option<bool>,
    pub notes: Option<String>,
}

impl QuotationPatch {
    pub fn applied_to(self, quotation: &Quotation, now: DateTime<Utc>) -> WorkflowResult<Quotation> {
        let mut next = quotation.clone();
        if let Some(v) = self.price_per_unit_cents {
            next.price_per_unit_cents = v;
        }
        if let Some(v) = self.moq {
            next.moq = v;
        }
        if let Some(v) = self.lead_time_days {
            next.lead_time_days = v;
        }
        if self.payment_terms.is_some() {
            next.payment_terms = self.payment_terms;
        }
        if self.shipping_terms.is_some() {
            next.shipping_terms = self.shipping_terms;
        }
        if let Some(v) = self.validity_days {
            next.validity_days = v;
        }
        if let Some(v) = self.quality_guarantee {
            next.quality_guarantee = v;
        }
        if let Some(v) = self.sample_available {
            next.sample_available = v;
        }
        if self.notes.is_some() {
            next.notes = self.notes;
        }
        next.validate()?;
        next.updated_at = now;
        Ok(next)
    }
}
