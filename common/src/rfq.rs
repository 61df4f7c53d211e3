use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::{require_positive, require_text, WorkflowError, WorkflowResult};
use crate::identity::ProfileId;
use crate::insight::RfqSummary;

crate::define_id!(
    /// Unique request-for-quotation identifier.
    RfqId
);

/// Lifecycle of a sourcing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    /// Submitted by the buyer, waiting for an admin.
    PendingApproval,
    /// Vetted; suppliers may be assigned, open-bidding suppliers may quote.
    Approved,
    /// At least one supplier explicitly assigned.
    Matched,
    /// At least one quotation submitted.
    Quoting,
    /// A quotation was accepted, or the admin withdrew an approved request.
    Closed,
    /// Refused before approval.
    Rejected,
}

impl RfqStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RfqStatus::PendingApproval => "pending_approval",
            RfqStatus::Approved => "approved",
            RfqStatus::Matched => "matched",
            RfqStatus::Quoting => "quoting",
            RfqStatus::Closed => "closed",
            RfqStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RfqStatus::Closed | RfqStatus::Rejected)
    }

    /// Statuses from which a buyer may still accept a quotation.
    pub fn is_open_for_acceptance(self) -> bool {
        matches!(
            self,
            RfqStatus::Approved | RfqStatus::Matched | RfqStatus::Quoting
        )
    }

    /// Returns true if moving from self to `next` is a legal edge.
    pub fn can_transition_to(self, next: RfqStatus) -> bool {
        use RfqStatus::*;
        matches!(
            (self, next),
            (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Approved, Matched)
                | (Approved, Quoting)
                | (Matched, Quoting)
                | (Approved, Closed)
                | (Matched, Closed)
                | (Quoting, Closed)
        )
    }

    /// Validate the edge, returning the new status.
    pub fn transition(self, next: RfqStatus) -> WorkflowResult<RfqStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WorkflowError::invalid_transition("rfq", self, next))
        }
    }
}

impl fmt::Display for RfqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A buyer's sourcing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rfq {
    pub id: RfqId,
    /// Owner. Never changes after creation.
    pub buyer_id: ProfileId,
    pub title: String,
    pub category: String,
    pub description: String,
    pub quantity: u64,
    pub unit: String,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub target_price_cents: Option<u64>,
    #[serde(default)]
    pub max_price_cents: Option<u64>,
    #[serde(default)]
    pub delivery_timeline: Option<String>,
    #[serde(default)]
    pub delivery_location: Option<String>,
    #[serde(default)]
    pub shipping_terms: Option<String>,
    #[serde(default)]
    pub quality_requirements: Option<String>,
    #[serde(default)]
    pub certifications_required: Option<String>,
    #[serde(default)]
    pub open_for_bidding: bool,
    pub status: RfqStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub insight: Option<RfqSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rfq {
    /// Field-level checks shared by creation and edits.
    pub fn validate(&self) -> WorkflowResult<()> {
        require_text("title", &self.title)?;
        require_text("category", &self.category)?;
        require_text("description", &self.description)?;
        require_text("unit", &self.unit)?;
        require_positive("quantity", self.quantity)?;
        if let Some(target) = self.target_price_cents {
            require_positive("target_price_cents", target)?;
        }
        if let Some(max) = self.max_price_cents {
            require_positive("max_price_cents", max)?;
            if self.target_price_cents.is_some_and(|target| max < target) {
                return Err(WorkflowError::validation(
                    "max_price_cents",
                    "must not be below the target price",
                ));
            }
        }
        Ok(())
    }
}

/// Buyer input for a new RFQ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRfq {
    pub title: String,
    pub category: String,
    pub description: String,
    pub quantity: u64,
    pub unit: String,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub target_price_cents: Option<u64>,
    #[serde(default)]
    pub max_price_cents: Option<u64>,
    #[serde(default)]
    pub delivery_timeline: Option<String>,
    #[serde(default)]
    pub delivery_location: Option<String>,
    #[serde(default)]
    pub shipping_terms: Option<String>,
    #[serde(default)]
    pub quality_requirements: Option<String>,
    #[serde(default)]
    pub certifications_required: Option<String>,
    #[serde(default)]
    pub open_for_bidding: bool,
}

impl NewRfq {
    pub fn into_rfq(self, buyer_id: ProfileId, now: DateTime<Utc>) -> WorkflowResult<Rfq> {
        let rfq = Rfq {
            id: RfqId::new(),
            buyer_id,
            title: self.title.trim().to_string(),
            category: self.category.trim().to_string(),
            description: self.description,
            quantity: self.quantity,
            unit: self.unit.trim().to_string(),
            currency: self.currency,
            target_price_cents: self.target_price_cents,
            max_price_cents: self.max_price_cents,
            delivery_timeline: self.delivery_timeline,
            delivery_location: self.delivery_location,
            shipping_terms: self.shipping_terms,
            quality_requirements: self.quality_requirements,
            certifications_required: self.certifications_required,
            open_for_bidding: self.open_for_bidding,
            status: RfqStatus::PendingApproval,
            rejection_reason: None,
            insight: None,
            created_at: now,
            updated_at: now,
        };
        rfq.validate()?;
        Ok(rfq)
    }
}

/// Partial edit of an RFQ's content. Status and owner are not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RfqPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<u64>,
    pub unit: Option<String>,
    pub target_price_cents: Option<u64>,
    pub max_price_cents: Option<u64>,
    pub delivery_timeline: Option<String>,
    pub delivery_location: Option<String>,
    pub shipping_terms: Option<String>,
    pub quality_requirements: Option<String>,
    pub certifications_required: Option<String>,
    pub open_for_bidding: Option<bool>,
}

impl RfqPatch {
    /// Apply onto a copy of `rfq` and validate the result.
    pub fn applied_to(self, rfq: &Rfq, now: DateTime<Utc>) -> WorkflowResult<Rfq> {
        let mut next = rfq.clone();
        if let Some(v) = self.title {
            next.title = v.trim().to_string();
        }
        if let Some(v) = self.category {
            next.category = v.trim().to_string();
        }
        if let Some(v) = self.description {
            next.description = v;
        }
        if let Some(v) = self.quantity {
            next.quantity = v;
        }
        if let Some(v) = self.unit {
            next.unit = v.trim().to_string();
        }
        if self.target_price_cents.is_some() {
            next.target_price_cents = self.target_price_cents;
        }
        if self.max_price_cents.is_some() {
            next.max_price_cents = self.max_price_cents;
        }
        if self.delivery_timeline.is_some() {
            next.delivery_timeline = self.delivery_timeline;
        }
        if self.delivery_location.is_some() {
            next.delivery_location = self.delivery_location;
        }
        if self.shipping_terms.is_some() {
            next.shipping_terms = self.shipping_terms;
        }
        if self.quality_requirements.is_some() {
            next.quality_requirements = self.quality_requirements;
        }
        if self.certifications_required.is_some() {
            next.certifications_required = self.certifications_required;
        }
        if let Some(v) = self.open_for_bidding {
            next.open_for_bidding = v;
        }
        next.validate()?;
        next.updated_at = now;
        Ok(next)
    }
}
