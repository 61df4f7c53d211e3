use std::collections::BTreeSet;

use chrono::Utc;

use rfqhub_common::alert::AlertKind;
use rfqhub_common::error::{require_text, WorkflowError, WorkflowResult};
use rfqhub_common::identity::{Actor, ProfileId, Role, VerificationStatus};
use rfqhub_common::matching::{open_bidding_match, rank_suppliers, Assignment, MatchScore};
use rfqhub_common::rfq::{Rfq, RfqId, RfqStatus};

use super::Engine;
use crate::store::RfqFilter;

impl Engine {
    /// Route an approved RFQ to verified suppliers and mark it `matched`.
    ///
    /// Every supplier is checked before anything is written.
    pub async fn assign_suppliers(
        &self,
        actor: &Actor,
        rfq_id: RfqId,
        supplier_ids: Vec<ProfileId>,
    ) -> WorkflowResult<Rfq> {
        let rfq = self.admin_rfq(actor, rfq_id).await?;
        if rfq.status != RfqStatus::Approved {
            return Err(WorkflowError::invalid_transition(
                "rfq",
                rfq.status,
                RfqStatus::Matched,
            ));
        }
        if supplier_ids.is_empty() {
            return Err(WorkflowError::validation(
                "supplier_ids",
                "at least one supplier is required",
            ));
        }
        let unique: BTreeSet<ProfileId> = supplier_ids.iter().copied().collect();
        if unique.len() != supplier_ids.len() {
            return Err(WorkflowError::validation(
                "supplier_ids",
                "a supplier is listed more than once",
            ));
        }
        for id in &supplier_ids {
            let verified = self
                .store
                .get_supplier_details(*id)
                .await?
                .is_some_and(|d| d.is_verified());
            if !verified {
                return Err(WorkflowError::validation(
                    "supplier_ids",
                    format!("supplier {id} is not verified"),
                ));
            }
        }

        let now = Utc::now();
        let assignments: Vec<Assignment> = supplier_ids
            .iter()
            .map(|&supplier_id| Assignment {
                rfq_id,
                supplier_id,
                assigned_by: actor.id,
                assigned_at: now,
            })
            .collect();
        let expected = rfq.status;
        let mut next = rfq;
        next.status = expected.transition(RfqStatus::Matched)?;
        next.updated_at = now;
        self.store
            .commit_assignments(&next, expected, &assignments)
            .await?;
        tracing::info!(rfq_id = %rfq_id, suppliers = assignments.len(), "rfq matched");
        Ok(next)
    }

    /// Open-bidding RFQs in the acting supplier's categories. Unverified
    /// suppliers get nothing.
    pub async fn open_rfqs(&self, actor: &Actor) -> WorkflowResult<Vec<Rfq>> {
        actor.require(Role::Supplier)?;
        let Some(details) = self
            .store
            .get_supplier_details(actor.id)
            .await?
            .filter(|d| d.is_verified())
        else {
            return Ok(Vec::new());
        };
        let rfqs = self.store.find_rfqs(&RfqFilter::default()).await?;
        Ok(open_bidding_match(&rfqs, &details.product_categories)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Advisory ranking of verified suppliers for an RFQ.
    pub async fn suggest_suppliers(
        &self,
        actor: &Actor,
        rfq_id: RfqId,
    ) -> WorkflowResult<Vec<MatchScore>> {
        actor.require(Role::Admin)?;
        let rfq = self.load_rfq(rfq_id).await?;
        let suppliers = self
            .store
            .list_supplier_details(Some(VerificationStatus::Verified))
            .await?;
        Ok(rank_suppliers(&rfq, &suppliers))
    }

    /// A supplier asks the admin about an RFQ it can see.
    pub async fn ask_question(
        &self,
        actor: &Actor,
        rfq_id: RfqId,
        question: &str,
    ) -> WorkflowResult<()> {
        actor.require(Role::Supplier)?;
        require_text("question", question)?;
        let rfq = self.get_rfq(actor, rfq_id).await?;
        self.alerts
            .record(AlertKind::SupplierQuestion {
                rfq_id: rfq.id,
                supplier_id: actor.id,
                question: question.trim().to_string(),
            })
            .await;
        Ok(())
    }
}
