use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use rfqhub_common::alert::AlertKind;
use rfqhub_common::error::{WorkflowError, WorkflowResult};
use rfqhub_common::identity::{Actor, Role};
use rfqhub_common::order::Order;
use rfqhub_common::policy::{Field, Guarded};
use rfqhub_common::quotation::{
    NewQuotation, Quotation, QuotationId, QuotationPatch, QuotationStatus,
};
use rfqhub_common::rfq::{Rfq, RfqId, RfqStatus};

use super::Engine;
use crate::store::{Acceptance, QuotationFilter, RfqFilter};

/// Buyer's acceptance of a quotation. Quantity defaults to the quotation's MOQ.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcceptQuotation {
    #[serde(default)]
    pub quantity: Option<u64>,
}

impl Engine {
    /// A verified supplier quotes on an RFQ it can see.
    ///
    /// The RFQ must be `matched` or `quoting`, or `approved` with open bidding.
    /// The first quotation moves the RFQ into `quoting`.
    pub async fn submit_quotation(
        &self,
        actor: &Actor,
        rfq_id: RfqId,
        input: NewQuotation,
    ) -> WorkflowResult<Quotation> {
        actor.require(Role::Supplier)?;
        let facts = self.facts(actor).await?;
        if !facts.supplier.as_ref().is_some_and(|s| s.is_verified()) {
            return Err(WorkflowError::forbidden("only verified suppliers may quote"));
        }

        let rfq = self.load_rfq(rfq_id).await?;
        if !rfq.can_view(actor, &facts.context(None)) {
            return Err(WorkflowError::not_found("rfq", rfq_id));
        }
        let accepting = match rfq.status {
            RfqStatus::Approved => rfq.open_for_bidding,
            RfqStatus::Matched | RfqStatus::Quoting => true,
            _ => false,
        };
        if !accepting {
            return Err(WorkflowError::invalid_transition(
                "rfq",
                rfq.status,
                RfqStatus::Quoting,
            ));
        }

        let live = self
            .store
            .find_quotations(&QuotationFilter {
                rfq_id: Some(rfq_id),
                supplier_id: Some(actor.id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .any(|q| !q.status.is_terminal());
        if live {
            return Err(WorkflowError::validation(
                "rfq_id",
                "a live quotation for this rfq already exists; revise it instead",
            ));
        }

        let mut quotation = input.into_quotation(rfq_id, actor.id, rfq.currency, Utc::now())?;
        quotation.insight = Some(self.insights.analyze_quotation(&rfq, &quotation).await);

        self.begin_quoting(rfq, &quotation).await?;
        tracing::info!(
            quotation_id = %quotation.id,
            rfq_id = %rfq_id,
            supplier_id = %actor.id,
            price_per_unit_cents = quotation.price_per_unit_cents,
            "quotation submitted"
        );
        Ok(quotation)
    }

    /// Supplier edits its own quotation while it awaits review.
    pub async fn revise_quotation(
        &self,
        actor: &Actor,
        id: QuotationId,
        patch: QuotationPatch,
    ) -> WorkflowResult<Quotation> {
        let (quotation, rfq) = self.visible_quotation(actor, id).await?;
        let facts = self.facts(actor).await?;
        if !quotation.can_mutate(actor, Field::Content, &facts.context(Some(&rfq))) {
            return Err(WorkflowError::forbidden(format!(
                "quotation cannot be revised while {}",
                quotation.status
            )));
        }
        let mut next = patch.applied_to(&quotation, Utc::now())?;
        next.insight = Some(self.insights.analyze_quotation(&rfq, &next).await);
        self.store.update_quotation(&next, quotation.status).await?;
        tracing::debug!(quotation_id = %id, "quotation revised");
        Ok(next)
    }

    pub async fn get_quotation(&self, actor: &Actor, id: QuotationId) -> WorkflowResult<Quotation> {
        Ok(self.visible_quotation(actor, id).await?.0)
    }

    /// Quotations on one RFQ. Buyers only ever see moderated ones.
    pub async fn list_quotations_for_rfq(
        &self,
        actor: &Actor,
        rfq_id: RfqId,
    ) -> WorkflowResult<Vec<Quotation>> {
        let rfq = self.get_rfq(actor, rfq_id).await?;
        let facts = self.facts(actor).await?;
        let ctx = facts.context(Some(&rfq));
        Ok(self
            .store
            .find_quotations(&QuotationFilter {
                rfq_id: Some(rfq_id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .filter(|q| q.can_view(actor, &ctx))
            .collect())
    }

    pub async fn list_quotations(
        &self,
        actor: &Actor,
        mut filter: QuotationFilter,
    ) -> WorkflowResult<Vec<Quotation>> {
        if actor.role == Role::Supplier {
            filter.supplier_id = Some(actor.id);
        }
        let own_rfqs: HashMap<RfqId, Rfq> = if actor.role == Role::Buyer {
            self.store
                .find_rfqs(&RfqFilter {
                    buyer_id: Some(actor.id),
                    ..Default::default()
                })
                .await?
                .into_iter()
                .map(|r| (r.id, r))
                .collect()
        } else {
            HashMap::new()
        };
        let facts = self.facts(actor).await?;
        Ok(self
            .store
            .find_quotations(&filter)
            .await?
            .into_iter()
            .filter(|q| q.can_view(actor, &facts.context(own_rfqs.get(&q.rfq_id))))
            .collect())
    }

    /// Moderation: release a quotation to the buyer.
    pub async fn approve_quotation(&self, actor: &Actor, id: QuotationId) -> WorkflowResult<Quotation> {
        actor.require(Role::Admin)?;
        let (quotation, _) = self.visible_quotation(actor, id).await?;
        self.transition_quotation(quotation, QuotationStatus::ApprovedForBuyer, None)
            .await
    }

    /// Moderation: refuse a quotation. Terminal.
    pub async fn reject_quotation(
        &self,
        actor: &Actor,
        id: QuotationId,
        reason: Option<String>,
    ) -> WorkflowResult<Quotation> {
        actor.require(Role::Admin)?;
        let (quotation, _) = self.visible_quotation(actor, id).await?;
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self.transition_quotation(quotation, QuotationStatus::Rejected, reason)
            .await
    }

    /// Buyer accepts a moderated quotation.
    ///
    /// In one store commit: the RFQ closes, the quotation is accepted, every
    /// other live quotation on the RFQ is superseded and the order is created.
    pub async fn accept_quotation(
        &self,
        actor: &Actor,
        id: QuotationId,
        input: AcceptQuotation,
    ) -> WorkflowResult<Order> {
        actor.require(Role::Buyer)?;
        let (quotation, rfq) = self.visible_quotation(actor, id).await?;
        let now = Utc::now();

        let mut accepted = quotation.clone();
        accepted.status = quotation.status.transition(QuotationStatus::Accepted)?;
        accepted.updated_at = now;

        if !rfq.status.is_open_for_acceptance() {
            return Err(WorkflowError::invalid_transition(
                "rfq",
                rfq.status,
                RfqStatus::Closed,
            ));
        }
        let mut closed = rfq.clone();
        closed.status = rfq.status.transition(RfqStatus::Closed)?;
        closed.updated_at = now;

        if quotation.is_expired(now) {
            return Err(WorkflowError::Conflict {
                entity: "quotation",
                expected: format!("valid until {}", quotation.valid_until().format("%Y-%m-%d")),
                actual: "expired".into(),
            });
        }

        let quantity = input.quantity.unwrap_or(quotation.moq);
        let order = Order::from_acceptance(&rfq, &quotation, quantity, now)?;

        let superseded = self
            .store
            .commit_acceptance(&Acceptance {
                rfq: closed,
                rfq_expected: rfq.status,
                quotation: accepted,
                quotation_expected: quotation.status,
                order: order.clone(),
            })
            .await?;
        tracing::info!(
            quotation_id = %id,
            rfq_id = %rfq.id,
            order_id = %order.id,
            total_value_cents = order.total_value_cents,
            superseded = superseded.len(),
            "quotation accepted"
        );

        self.alerts
            .record(AlertKind::QuoteAccepted {
                quotation_id: id,
                rfq_id: rfq.id,
                order_id: order.id,
            })
            .await;
        Ok(order)
    }

    /// Load a quotation with its RFQ, hiding it unless the actor may view it.
    pub(super) async fn visible_quotation(
        &self,
        actor: &Actor,
        id: QuotationId,
    ) -> WorkflowResult<(Quotation, Rfq)> {
        let quotation = self
            .store
            .get_quotation(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("quotation", id))?;
        let rfq = self.load_rfq(quotation.rfq_id).await?;
        let facts = self.facts(actor).await?;
        if !quotation.can_view(actor, &facts.context(Some(&rfq))) {
            return Err(WorkflowError::not_found("quotation", id));
        }
        Ok((quotation, rfq))
    }

    async fn transition_quotation(
        &self,
        mut quotation: Quotation,
        next: QuotationStatus,
        reason: Option<String>,
    ) -> WorkflowResult<Quotation> {
        let expected = quotation.status;
        quotation.status = expected.transition(next)?;
        if reason.is_some() {
            quotation.rejection_reason = reason;
        }
        quotation.updated_at = Utc::now();
        self.store.update_quotation(&quotation, expected).await?;
        tracing::info!(quotation_id = %quotation.id, from = %expected, to = %next, "quotation status changed");
        Ok(quotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_rfq, offer, World};
    use rfqhub_common::insight::{InsightShape, QuotationAnalysis};
    use crate::store::{EntityStore, OrderFilter};
    use rfqhub_common::order::OrderStatus;

    /// Buyer RFQ approved and assigned to `supplier`.
    async fn matched_rfq(w: &World, buyer: &Actor, supplier: &Actor) -> Rfq {
        let rfq = w.engine.submit_rfq(buyer, new_rfq("Apparel")).await.unwrap();
        w.engine.approve_rfq(&w.admin, rfq.id).await.unwrap();
        w.engine
            .assign_suppliers(&w.admin, rfq.id, vec![supplier.id])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn scenario_cotton_tshirts() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let rfq = matched_rfq(&w, &buyer, &s1).await;
        assert_eq!(rfq.status, RfqStatus::Matched);

        let q = w.engine.submit_quotation(&s1, rfq.id, offer(320, 1000)).await.unwrap();
        assert_eq!(q.status, QuotationStatus::PendingAdminReview);
        assert_eq!(q.insight, Some(QuotationAnalysis::fallback()));
        let rfq_now = w.engine.get_rfq(&buyer, rfq.id).await.unwrap();
        assert_eq!(rfq_now.status, RfqStatus::Quoting);

        // Invisible to the buyer until moderated.
        assert!(w
            .engine
            .list_quotations_for_rfq(&buyer, rfq.id)
            .await
            .unwrap()
            .is_empty());

        w.engine.approve_quotation(&w.admin, q.id).await.unwrap();
        let seen = w.engine.list_quotations_for_rfq(&buyer, rfq.id).await.unwrap();
        assert_eq!(seen.len(), 1);

        let order = w
            .engine
            .accept_quotation(&buyer, q.id, AcceptQuotation::default())
            .await
            .unwrap();
        assert_eq!(order.quantity, 1000);
        assert_eq!(order.total_value_cents, 320_000);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.total_is_consistent());

        let q = w.engine.get_quotation(&buyer, q.id).await.unwrap();
        assert_eq!(q.status, QuotationStatus::Accepted);
        let rfq_now = w.engine.get_rfq(&buyer, rfq.id).await.unwrap();
        assert_eq!(rfq_now.status, RfqStatus::Closed);
    }

    #[tokio::test]
    async fn second_acceptance_fails_without_duplicate_order() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let rfq = matched_rfq(&w, &buyer, &s1).await;
        let q = w.engine.submit_quotation(&s1, rfq.id, offer(320, 1000)).await.unwrap();
        w.engine.approve_quotation(&w.admin, q.id).await.unwrap();

        w.engine
            .accept_quotation(&buyer, q.id, AcceptQuotation::default())
            .await
            .unwrap();
        let err = w
            .engine
            .accept_quotation(&buyer, q.id, AcceptQuotation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert_eq!(w.engine.list_orders(&buyer, OrderFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn acceptance_supersedes_siblings() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let s2 = w.verified_supplier("s2@example.com", "Apparel").await;
        let rfq = w.engine.submit_rfq(&buyer, new_rfq("Apparel")).await.unwrap();
        w.engine.approve_rfq(&w.admin, rfq.id).await.unwrap();
        w.engine
            .assign_suppliers(&w.admin, rfq.id, vec![s1.id, s2.id])
            .await
            .unwrap();

        let q1 = w.engine.submit_quotation(&s1, rfq.id, offer(320, 1000)).await.unwrap();
        let q2 = w.engine.submit_quotation(&s2, rfq.id, offer(310, 2000)).await.unwrap();
        w.engine.approve_quotation(&w.admin, q1.id).await.unwrap();

        w.engine
            .accept_quotation(&buyer, q1.id, AcceptQuotation { quantity: Some(5000) })
            .await
            .unwrap();
        let q2 = w.engine.get_quotation(&s2, q2.id).await.unwrap();
        assert_eq!(q2.status, QuotationStatus::Superseded);
    }

    #[tokio::test]
    async fn quantity_below_moq_rejected() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let rfq = matched_rfq(&w, &buyer, &s1).await;
        let q = w.engine.submit_quotation(&s1, rfq.id, offer(320, 1000)).await.unwrap();
        w.engine.approve_quotation(&w.admin, q.id).await.unwrap();

        let err = w
            .engine
            .accept_quotation(&buyer, q.id, AcceptQuotation { quantity: Some(999) })
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("quantity"));
        let rfq_now = w.engine.get_rfq(&buyer, rfq.id).await.unwrap();
        assert_eq!(rfq_now.status, RfqStatus::Quoting);
    }

    #[tokio::test]
    async fn buyer_cannot_accept_unmoderated_quotation() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let rfq = matched_rfq(&w, &buyer, &s1).await;
        let q = w.engine.submit_quotation(&s1, rfq.id, offer(320, 1000)).await.unwrap();

        let err = w
            .engine
            .accept_quotation(&buyer, q.id, AcceptQuotation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rejection_is_terminal() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let rfq = matched_rfq(&w, &buyer, &s1).await;
        let q = w.engine.submit_quotation(&s1, rfq.id, offer(320, 1000)).await.unwrap();

        let rejected = w
            .engine
            .reject_quotation(&w.admin, q.id, Some("price above market".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, QuotationStatus::Rejected);

        let err = w
            .engine
            .revise_quotation(
                &s1,
                q.id,
                QuotationPatch {
                    price_per_unit_cents: Some(300),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden { .. }));
        let err = w.engine.approve_quotation(&w.admin, q.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

        // A fresh quotation is allowed once the previous one is terminal.
        assert!(w.engine.submit_quotation(&s1, rfq.id, offer(300, 1000)).await.is_ok());
    }

    #[tokio::test]
    async fn one_live_quotation_per_supplier() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let rfq = matched_rfq(&w, &buyer, &s1).await;
        w.engine.submit_quotation(&s1, rfq.id, offer(320, 1000)).await.unwrap();
        let err = w
            .engine
            .submit_quotation(&s1, rfq.id, offer(310, 1000))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("rfq_id"));
    }

    #[tokio::test]
    async fn unassigned_or_unverified_suppliers_cannot_quote() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let outsider = w.verified_supplier("s2@example.com", "Apparel").await;
        let pending = w.pending_supplier("s3@example.com", "Apparel").await;
        let rfq = matched_rfq(&w, &buyer, &s1).await;

        let err = w
            .engine
            .submit_quotation(&outsider, rfq.id, offer(320, 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));

        let err = w
            .engine
            .submit_quotation(&pending, rfq.id, offer(320, 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn open_bidding_rfq_skips_matching() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Spices").await;
        let mut input = new_rfq("Spices");
        input.open_for_bidding = true;
        let rfq = w.engine.submit_rfq(&buyer, input).await.unwrap();

        // Pending approval: not visible yet.
        let err = w
            .engine
            .submit_quotation(&s1, rfq.id, offer(500, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));

        w.engine.approve_rfq(&w.admin, rfq.id).await.unwrap();
        w.engine.submit_quotation(&s1, rfq.id, offer(500, 100)).await.unwrap();
        let rfq_now = w.engine.get_rfq(&w.admin, rfq.id).await.unwrap();
        assert_eq!(rfq_now.status, RfqStatus::Quoting);
    }

    #[tokio::test]
    async fn open_bidding_stays_open_after_first_quotation() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Spices").await;
        let s2 = w.verified_supplier("s2@example.com", "Spices").await;
        let mut input = new_rfq("Spices");
        input.open_for_bidding = true;
        let rfq = w.engine.submit_rfq(&buyer, input).await.unwrap();
        w.engine.approve_rfq(&w.admin, rfq.id).await.unwrap();

        let q1 = w.engine.submit_quotation(&s1, rfq.id, offer(500, 100)).await.unwrap();
        // The first bidder still sees the RFQ and its own quotation.
        let seen = w.engine.get_rfq(&s1, rfq.id).await.unwrap();
        assert_eq!(seen.status, RfqStatus::Quoting);
        assert_eq!(w.engine.get_quotation(&s1, q1.id).await.unwrap().id, q1.id);

        let open = w.engine.open_rfqs(&s2).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, rfq.id);
        w.engine.submit_quotation(&s2, rfq.id, offer(480, 100)).await.unwrap();
        let all = w
            .engine
            .list_quotations_for_rfq(&w.admin, rfq.id)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn refused_quotation_leaves_rfq_status_alone() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let rfq = matched_rfq(&w, &buyer, &s1).await;

        // A live quotation already stored without moving the RFQ.
        let existing = offer(320, 1000)
            .into_quotation(rfq.id, s1.id, rfq.currency, Utc::now())
            .unwrap();
        w.store
            .commit_quotation(&existing, &rfq, RfqStatus::Matched)
            .await
            .unwrap();

        let err = w
            .engine
            .submit_quotation(&s1, rfq.id, offer(310, 1000))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("rfq_id"));
        let rfq_now = w.engine.get_rfq(&buyer, rfq.id).await.unwrap();
        assert_eq!(rfq_now.status, RfqStatus::Matched);
    }

    #[tokio::test]
    async fn suppliers_list_only_their_own_quotations() {
        let w = World::new().await;
        let buyer = w.buyer("b@example.com").await;
        let s1 = w.verified_supplier("s1@example.com", "Apparel").await;
        let s2 = w.verified_supplier("s2@example.com", "Apparel").await;
        let rfq = w.engine.submit_rfq(&buyer, new_rfq("Apparel")).await.unwrap();
        w.engine.approve_rfq(&w.admin, rfq.id).await.unwrap();
        w.engine
            .assign_suppliers(&w.admin, rfq.id, vec![s1.id, s2.id])
            .await
            .unwrap();
        let q1 = w.engine.submit_quotation(&s1, rfq.id, offer(320, 1000)).await.unwrap();
        w.engine.submit_quotation(&s2, rfq.id, offer(330, 1000)).await.unwrap();

        let mine = w
            .engine
            .list_quotations(&s1, QuotationFilter::default())
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, q1.id);
        assert!(w
            .engine
            .list_quotations(&buyer, QuotationFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            w.engine
                .list_quotations(&w.admin, QuotationFilter::default())
                .await
                .unwrap()
                .len(),
            2
        );
    }
}
