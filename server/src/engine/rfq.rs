use chrono::Utc;

use rfqhub_common::alert::AlertKind;
use rfqhub_common::error::{WorkflowError, WorkflowResult};
use rfqhub_common::identity::{Actor, Role};
use rfqhub_common::policy::{Field, Guarded};
use rfqhub_common::quotation::Quotation;
use rfqhub_common::rfq::{NewRfq, Rfq, RfqId, RfqPatch, RfqStatus};

use super::Engine;
use crate::store::RfqFilter;

impl Engine {
    /// Buyer submits a new RFQ. It waits in `pending_approval` for an admin.
    pub async fn submit_rfq(&self, actor: &Actor, input: NewRfq) -> WorkflowResult<Rfq> {
        actor.require(Role::Buyer)?;
        let mut rfq = input.into_rfq(actor.id, Utc::now())?;
        rfq.insight = Some(self.insights.summarize_rfq(&rfq).await);
        self.store.insert_rfq(&rfq).await?;
        tracing::info!(rfq_id = %rfq.id, buyer_id = %actor.id, category = %rfq.category, "rfq submitted");

        self.alerts
            .record(AlertKind::RfqSubmitted {
                rfq_id: rfq.id,
                buyer_id: actor.id,
                title: rfq.title.clone(),
            })
            .await;
        Ok(rfq)
    }

    pub async fn get_rfq(&self, actor: &Actor, id: RfqId) -> WorkflowResult<Rfq> {
        let rfq = self.load_rfq(id).await?;
        let facts = self.facts(actor).await?;
        if !rfq.can_view(actor, &facts.context(None)) {
            return Err(WorkflowError::not_found("rfq", id));
        }
        Ok(rfq)
    }

    /// RFQs matching `filter` that the actor may see. Buyers are always pinned
    /// to their own RFQs.
    pub async fn list_rfqs(&self, actor: &Actor, mut filter: RfqFilter) -> WorkflowResult<Vec<Rfq>> {
        if actor.role == Role::Buyer {
            filter.buyer_id = Some(actor.id);
        }
        let facts = self.facts(actor).await?;
        let ctx = facts.context(None);
        Ok(self
            .store
            .find_rfqs(&filter)
            .await?
            .into_iter()
            .filter(|rfq| rfq.can_view(actor, &ctx))
            .collect())
    }

    /// Content edit: the owning buyer while pending approval, or an admin
    /// until the RFQ is terminal.
    pub async fn edit_rfq(&self, actor: &Actor, id: RfqId, patch: RfqPatch) -> WorkflowResult<Rfq> {
        let rfq = self.get_rfq(actor, id).await?;
        let facts = self.facts(actor).await?;
        if !rfq.can_mutate(actor, Field::Content, &facts.context(None)) {
            return Err(WorkflowError::forbidden(format!(
                "rfq content cannot be edited while {}",
                rfq.status
            )));
        }
        let next = patch.applied_to(&rfq, Utc::now())?;
        self.store.update_rfq(&next, rfq.status).await?;
        tracing::debug!(rfq_id = %id, editor = %actor.id, "rfq edited");
        Ok(next)
    }

    pub async fn approve_rfq(&self, actor: &Actor, id: RfqId) -> WorkflowResult<Rfq> {
        let rfq = self.admin_rfq(actor, id).await?;
        self.transition_rfq(rfq, RfqStatus::Approved, None).await
    }

    /// Before approval this rejects; after approval it closes the RFQ.
    pub async fn reject_rfq(
        &self,
        actor: &Actor,
        id: RfqId,
        reason: Option<String>,
    ) -> WorkflowResult<Rfq> {
        let rfq = self.admin_rfq(actor, id).await?;
        let next = match rfq.status {
            RfqStatus::PendingApproval => RfqStatus::Rejected,
            RfqStatus::Approved => RfqStatus::Closed,
            other => {
                return Err(WorkflowError::invalid_transition(
                    "rfq",
                    other,
                    RfqStatus::Rejected,
                ))
            }
        };
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self.transition_rfq(rfq, next, reason).await
    }

    /// Store a new quotation together with its RFQ, moving the RFQ into
    /// `quoting` on the first one. Nothing is written if either part fails.
    pub(super) async fn begin_quoting(
        &self,
        rfq: Rfq,
        quotation: &Quotation,
    ) -> WorkflowResult<Rfq> {
        let id = rfq.id;
        match self.commit_quoting(rfq, quotation).await {
            Err(WorkflowError::Conflict { .. }) => {
                // Lost the race to another supplier's first quotation.
                let current = self.load_rfq(id).await?;
                if current.status != RfqStatus::Quoting {
                    return Err(WorkflowError::invalid_transition(
                        "rfq",
                        current.status,
                        RfqStatus::Quoting,
                    ));
                }
                self.commit_quoting(current, quotation).await
            }
            other => other,
        }
    }

    async fn commit_quoting(&self, rfq: Rfq, quotation: &Quotation) -> WorkflowResult<Rfq> {
        let expected = rfq.status;
        if expected == RfqStatus::Quoting {
            self.store.commit_quotation(quotation, &rfq, expected).await?;
            return Ok(rfq);
        }
        let mut next = rfq;
        next.status = expected.transition(RfqStatus::Quoting)?;
        next.updated_at = Utc::now();
        self.store.commit_quotation(quotation, &next, expected).await?;
        tracing::info!(rfq_id = %next.id, from = %expected, to = %next.status, "rfq status changed");
        Ok(next)
    }

    pub(super) async fn admin_rfq(&self, actor: &Actor, id: RfqId) -> WorkflowResult<Rfq> {
        actor.require(Role::Admin)?;
        let rfq = self.load_rfq(id).await?;
        let facts = self.facts(actor).await?;
        if !rfq.can_mutate(actor, Field::Status, &facts.context(None)) {
            return Err(WorkflowError::forbidden("rfq status is admin-controlled"));
        }
        Ok(rfq)
    }

    /// Validate the edge, then compare-and-update on the status we read.
    pub(super) async fn transition_rfq(
        &self,
        mut rfq: Rfq,
        next: RfqStatus,
        reason: Option<String>,
    ) -> WorkflowResult<Rfq> {
        let expected = rfq.status;
        rfq.status = expected.transition(next)?;
        if reason.is_some() {
            rfq.rejection_reason = reason;
        }
        rfq.updated_at = Utc::now();
        self.store.update_rfq(&rfq, expected).await?;
        tracing::info!(rfq_id = %rfq.id, from = %expected, to = %next, "rfq status changed");
        Ok(rfq)
    }
}
