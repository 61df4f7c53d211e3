//! Row-level access rules.
//!
//! Reads that fail these checks must look like the row does not exist; writes
//! that fail them are refused before any workflow rule runs.

use crate::identity::{Actor, Profile, Role, SupplierDetails};
use crate::matching::visible_through_open_bidding;
use crate::order::Order;
use crate::quotation::{Quotation, QuotationStatus};
use crate::rfq::{Rfq, RfqId, RfqStatus};
use crate::sample::{SampleRequest, SampleStatus};

/// What part of a record a write touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Descriptive data (titles, prices, terms).
    Content,
    /// Workflow status.
    Status,
    /// Owning profile reference.
    Owner,
    /// Supplier verification outcome.
    Verification,
    /// Profile role.
    Role,
}

/// Facts about the actor and related rows needed to evaluate a rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyContext<'a> {
    /// The acting supplier's own details, if it has submitted any.
    pub supplier: Option<&'a SupplierDetails>,
    /// RFQs explicitly assigned to the acting supplier.
    pub assigned_rfqs: &'a [RfqId],
    /// Parent RFQ of the record under evaluation.
    pub rfq: Option<&'a Rfq>,
}

pub trait Guarded {
    fn can_view(&self, actor: &Actor, ctx: &PolicyContext<'_>) -> bool;
    fn can_mutate(&self, actor: &Actor, field: Field, ctx: &PolicyContext<'_>) -> bool;
}

impl Guarded for Rfq {
    fn can_view(&self, actor: &Actor, ctx: &PolicyContext<'_>) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Buyer => self.buyer_id == actor.id,
            Role::Supplier => {
                ctx.assigned_rfqs.contains(&self.id)
                    || ctx
                        .supplier
                        .is_some_and(|s| s.supplier_id == actor.id && visible_through_open_bidding(self, s))
            }
        }
    }

    fn can_mutate(&self, actor: &Actor, field: Field, _ctx: &PolicyContext<'_>) -> bool {
        match (actor.role, field) {
            (_, Field::Owner) => false,
            (Role::Admin, Field::Status) => true,
            (Role::Admin, Field::Content) => !self.status.is_terminal(),
            (Role::Buyer, Field::Content) => {
                self.buyer_id == actor.id && self.status == RfqStatus::PendingApproval
            }
            _ => false,
        }
    }
}

impl Guarded for Quotation {
    fn can_view(&self, actor: &Actor, ctx: &PolicyContext<'_>) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Supplier => self.supplier_id == actor.id,
            Role::Buyer => {
                self.status.is_buyer_visible()
                    && ctx
                        .rfq
                        .is_some_and(|rfq| rfq.id == self.rfq_id && rfq.buyer_id == actor.id)
            }
        }
    }

    fn can_mutate(&self, actor: &Actor, field: Field, _ctx: &PolicyContext<'_>) -> bool {
        match (actor.role, field) {
            (_, Field::Owner) => false,
            (Role::Admin, Field::Status | Field::Content) => true,
            (Role::Supplier, Field::Content) => {
                self.supplier_id == actor.id
                    && self.status == QuotationStatus::PendingAdminReview
            }
            _ => false,
        }
    }
}

impl Guarded for SampleRequest {
    fn can_view(&self, actor: &Actor, _ctx: &PolicyContext<'_>) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Buyer => self.buyer_id == actor.id,
            Role::Supplier => self.supplier_id == actor.id,
        }
    }

    /// Status moves belong to the admin, except that the assigned supplier
    /// dispatches an admin-approved sample.
    fn can_mutate(&self, actor: &Actor, field: Field, _ctx: &PolicyContext<'_>) -> bool {
        match (actor.role, field) {
            (_, Field::Owner) => false,
            (Role::Admin, Field::Status | Field::Content) => true,
            (Role::Supplier, Field::Status) => {
                self.supplier_id == actor.id && self.status == SampleStatus::ApprovedByAdmin
            }
            (Role::Buyer, Field::Content) => {
                self.buyer_id == actor.id && self.status == SampleStatus::PendingAdminReview
            }
            _ => false,
        }
    }
}

impl Guarded for Order {
    fn can_view(&self, actor: &Actor, _ctx: &PolicyContext<'_>) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Buyer => self.buyer_id == actor.id,
            Role::Supplier => self.supplier_id == actor.id,
        }
    }

    fn can_mutate(&self, actor: &Actor, field: Field, _ctx: &PolicyContext<'_>) -> bool {
        match (actor.role, field) {
            (_, Field::Owner) => false,
            (Role::Admin, Field::Status | Field::Content) => true,
            (Role::Supplier, Field::Status) => self.supplier_id == actor.id,
            _ => false,
        }
    }
}

impl Guarded for SupplierDetails {
    fn can_view(&self, actor: &Actor, _ctx: &PolicyContext<'_>) -> bool {
        actor.is_admin() || self.supplier_id == actor.id
    }

    fn can_mutate(&self, actor: &Actor, field: Field, _ctx: &PolicyContext<'_>) -> bool {
        match field {
            Field::Verification => actor.is_admin(),
            Field::Content => actor.is_admin() || self.supplier_id == actor.id,
            _ => false,
        }
    }
}

impl Guarded for Profile {
    fn can_view(&self, actor: &Actor, _ctx: &PolicyContext<'_>) -> bool {
        actor.is_admin() || self.id == actor.id
    }

    fn can_mutate(&self, actor: &Actor, field: Field, _ctx: &PolicyContext<'_>) -> bool {
        match field {
            Field::Role => actor.is_admin(),
            Field::Content => actor.is_admin() || self.id == actor.id,
            _ => false,
        }
    }
}
