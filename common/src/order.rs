use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::currency::{line_total, Currency};
use crate::error::{require_text, WorkflowError, WorkflowResult};
use crate::identity::ProfileId;
use crate::quotation::{Quotation, QuotationId};
use crate::rfq::{Rfq, RfqId};

crate::define_id!(
    /// Unique order identifier.
    OrderId
);

/// Fulfilment status. Only ever advances one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Confirmed,
    InProduction,
    Shipped,
    #[serde(alias = "completed")]
    Delivered,
}

impl OrderStatus {
    /// Position in the fulfilment sequence.
    pub fn ordinal(self) -> u8 {
        match self {
            OrderStatus::Confirmed => 0,
            OrderStatus::InProduction => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Delivered => 3,
        }
    }

    /// Returns true if transitioning from self to `next` is valid.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        next.ordinal() == self.ordinal() + 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InProduction => "in_production",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment progress, forward only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    PartiallyPaid,
    Paid,
}

impl PaymentStatus {
    pub fn ordinal(self) -> u8 {
        match self {
            PaymentStatus::Pending => 0,
            PaymentStatus::PartiallyPaid => 1,
            PaymentStatus::Paid => 2,
        }
    }

    pub fn can_advance_to(self, next: PaymentStatus) -> bool {
        next.ordinal() > self.ordinal()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Paid => "paid",
        })
    }
}

/// Carrier details recorded when an order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub carrier: String,
    pub tracking_number: String,
    pub shipped_at: DateTime<Utc>,
}

impl Tracking {
    pub fn new(carrier: &str, tracking_number: &str, now: DateTime<Utc>) -> WorkflowResult<Self> {
        require_text("carrier", carrier)?;
        require_text("tracking_number", tracking_number)?;
        Ok(Self {
            carrier: carrier.trim().to_string(),
            tracking_number: tracking_number.trim().to_string(),
            shipped_at: now,
        })
    }
}

/// Created exactly once per accepted quotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub rfq_id: RfqId,
    pub quotation_id: QuotationId,
    pub buyer_id: ProfileId,
    pub supplier_id: ProfileId,
    pub quantity: u64,
    pub unit_price_cents: u64,
    pub total_value_cents: u64,
    #[serde(default)]
    pub currency: Currency,
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub tracking: Option<Tracking>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build the order for an accepted quotation. `quantity` must reach the MOQ.
    pub fn from_acceptance(
        rfq: &Rfq,
        quotation: &Quotation,
        quantity: u64,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Order> {
        if quantity < quotation.moq {
            return Err(WorkflowError::validation(
                "quantity",
                format!("must be at least the quotation MOQ of {}", quotation.moq),
            ));
        }
        let total_value_cents = line_total(quantity, quotation.price_per_unit_cents)
            .ok_or_else(|| WorkflowError::validation("quantity", "order value is too large"))?;
        Ok(Order {
            id: OrderId::new(),
            rfq_id: rfq.id,
            quotation_id: quotation.id,
            buyer_id: rfq.buyer_id,
            supplier_id: quotation.supplier_id,
            quantity,
            unit_price_cents: quotation.price_per_unit_cents,
            total_value_cents,
            currency: quotation.currency,
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Pending,
            tracking: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn total_is_consistent(&self) -> bool {
        line_total(self.quantity, self.unit_price_cents) == Some(self.total_value_cents)
    }
}
