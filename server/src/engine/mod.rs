//! Workflow engine.
//!
//! Every operation follows the same order: authenticate the actor's role, load
//! the rows, hide anything the actor may not view (`NotFound`), refuse writes
//! the policy forbids, validate the status edge, then compare-and-update.

mod matching;
mod onboarding;
mod order;
mod quotation;
mod rfq;
mod sample;

pub use onboarding::{CategoryInput, SignUp};
pub use order::AdvanceOrder;
pub use quotation::AcceptQuotation;

use std::sync::Arc;

use rfqhub_common::error::{WorkflowError, WorkflowResult};
use rfqhub_common::identity::{Actor, Role, SupplierDetails};
use rfqhub_common::policy::PolicyContext;
use rfqhub_common::rfq::{Rfq, RfqId};

use crate::alerts::AlertSink;
use crate::insights::InsightService;
use crate::store::{AssignmentFilter, EntityStore};

/// Explicitly constructed once at startup and shared behind `Arc<AppState>`.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn EntityStore>,
    alerts: AlertSink,
    insights: InsightService,
}

/// Rows the access policy needs about the acting supplier.
#[derive(Default)]
struct ActorFacts {
    supplier: Option<SupplierDetails>,
    assigned: Vec<RfqId>,
}

impl ActorFacts {
    fn context<'a>(&'a self, rfq: Option<&'a Rfq>) -> PolicyContext<'a> {
        PolicyContext {
            supplier: self.supplier.as_ref(),
            assigned_rfqs: &self.assigned,
            rfq,
        }
    }
}

impl Engine {
    pub fn new(store: Arc<dyn EntityStore>, insights: InsightService) -> Self {
        Self {
            alerts: AlertSink::new(store.clone()),
            store,
            insights,
        }
    }

    pub fn alerts(&self) -> &AlertSink {
        &self.alerts
    }

    async fn facts(&self, actor: &Actor) -> WorkflowResult<ActorFacts> {
        if actor.role != Role::Supplier {
            return Ok(ActorFacts::default());
        }
        let supplier = self.store.get_supplier_details(actor.id).await?;
        let assigned = self
            .store
            .find_assignments(&AssignmentFilter {
                supplier_id: Some(actor.id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|a| a.rfq_id)
            .collect();
        Ok(ActorFacts { supplier, assigned })
    }

    async fn load_rfq(&self, id: RfqId) -> WorkflowResult<Rfq> {
        self.store
            .get_rfq(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("rfq", id))
    }
}
