use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::ProfileId;
use crate::order::OrderId;
use crate::quotation::QuotationId;
use crate::rfq::RfqId;
use crate::sample::SampleRequestId;

crate::define_id!(
    /// Unique alert identifier.
    AlertId
);

/// Event an admin should look at. One variant per alert type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    SampleRequest {
        sample_id: SampleRequestId,
        rfq_id: RfqId,
        buyer_id: ProfileId,
    },
    QuoteAccepted {
        quotation_id: QuotationId,
        rfq_id: RfqId,
        order_id: OrderId,
    },
    RfqSubmitted {
        rfq_id: RfqId,
        buyer_id: ProfileId,
        title: String,
    },
    SupplierQuestion {
        rfq_id: RfqId,
        supplier_id: ProfileId,
        question: String,
    },
}

impl AlertKind {
    pub fn default_priority(&self) -> Priority {
        match self {
            AlertKind::QuoteAccepted { .. } => Priority::Urgent,
            AlertKind::SampleRequest { .. } => Priority::High,
            AlertKind::RfqSubmitted { .. } | AlertKind::SupplierQuestion { .. } => {
                Priority::Normal
            }
        }
    }

    pub fn rfq_id(&self) -> RfqId {
        match self {
            AlertKind::SampleRequest { rfq_id, .. }
            | AlertKind::QuoteAccepted { rfq_id, .. }
            | AlertKind::RfqSubmitted { rfq_id, .. }
            | AlertKind::SupplierQuestion { rfq_id, .. } => *rfq_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// An entry in the append-only alert log.
///
/// No delivery guarantee and no idempotency: recording the same event twice
/// produces two alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub kind: AlertKind,
    pub priority: Priority,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, now: DateTime<Utc>) -> Self {
        Self {
            id: AlertId::new(),
            priority: kind.default_priority(),
            kind,
            read: false,
            created_at: now,
        }
    }
}
