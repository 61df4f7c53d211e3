use chrono::Utc;

use rfqhub_common::alert::AlertKind;
use rfqhub_common::error::{WorkflowError, WorkflowResult};
use rfqhub_common::identity::{Actor, Role};
use rfqhub_common::policy::{Field, Guarded, PolicyContext};
use rfqhub_common::quotation::QuotationId;
use rfqhub_common::sample::{
    NewSampleQuote, NewSampleRequest, SampleQuote, SampleRequest, SampleRequestId, SampleStatus,
    ShipSample,
};

use super::Engine;
use crate::store::SampleFilter;

impl Engine {
    /// Buyer asks for a sample of a quotation it can see.
    pub async fn request_sample(
        &self,
        actor: &Actor,
        quotation_id: QuotationId,
        input: NewSampleRequest,
    ) -> WorkflowResult<SampleRequest> {
        actor.require(Role::Buyer)?;
        let (quotation, rfq) = self.visible_quotation(actor, quotation_id).await?;
        if !quotation.sample_available {
            return Err(WorkflowError::validation(
                "quotation_id",
                "the supplier does not offer samples for this quotation",
            ));
        }
        let sample = SampleRequest::new(
            input,
            rfq.id,
            quotation.id,
            actor.id,
            quotation.supplier_id,
            Utc::now(),
        )?;
        self.store.insert_sample(&sample).await?;
        tracing::info!(sample_id = %sample.id, quotation_id = %quotation_id, buyer_id = %actor.id, "sample requested");

        self.alerts
            .record(AlertKind::SampleRequest {
                sample_id: sample.id,
                rfq_id: rfq.id,
                buyer_id: actor.id,
            })
            .await;
        Ok(sample)
    }

    pub async fn approve_sample(
        &self,
        actor: &Actor,
        id: SampleRequestId,
    ) -> WorkflowResult<SampleRequest> {
        actor.require(Role::Admin)?;
        let sample = self.visible_sample(actor, id).await?;
        self.transition_sample(sample, SampleStatus::ApprovedByAdmin, |s, now| {
            s.approved_at = Some(now);
        })
        .await
    }

    pub async fn reject_sample(
        &self,
        actor: &Actor,
        id: SampleRequestId,
        reason: Option<String>,
    ) -> WorkflowResult<SampleRequest> {
        actor.require(Role::Admin)?;
        let sample = self.visible_sample(actor, id).await?;
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self.transition_sample(sample, SampleStatus::Rejected, move |s, now| {
            s.rejected_at = Some(now);
            s.rejection_reason = reason;
        })
        .await
    }

    /// The supplier attaches courier details. Only after admin approval.
    pub async fn ship_sample(
        &self,
        actor: &Actor,
        id: SampleRequestId,
        input: ShipSample,
    ) -> WorkflowResult<SampleRequest> {
        let sample = self.visible_sample(actor, id).await?;
        sample.status.transition(SampleStatus::ShippedBySupplier)?;
        if !sample.can_mutate(actor, Field::Status, &PolicyContext::default()) {
            return Err(WorkflowError::forbidden(
                "only the quoting supplier may ship a sample",
            ));
        }
        let shipment = input.into_shipment(Utc::now())?;
        self.transition_sample(sample, SampleStatus::ShippedBySupplier, |s, _| {
            s.shipment = Some(shipment);
        })
        .await
    }

    pub async fn mark_sample_delivered(
        &self,
        actor: &Actor,
        id: SampleRequestId,
    ) -> WorkflowResult<SampleRequest> {
        actor.require(Role::Admin)?;
        let sample = self.visible_sample(actor, id).await?;
        self.transition_sample(sample, SampleStatus::DeliveredToBuyer, |s, now| {
            s.delivered_at = Some(now);
        })
        .await
    }

    /// Supplier prices the sample. Allowed until it ships.
    pub async fn submit_sample_quote(
        &self,
        actor: &Actor,
        id: SampleRequestId,
        input: NewSampleQuote,
    ) -> WorkflowResult<SampleQuote> {
        actor.require(Role::Supplier)?;
        let sample = self.visible_sample(actor, id).await?;
        if sample.status.has_shipped() || sample.status == SampleStatus::Rejected {
            return Err(WorkflowError::forbidden(format!(
                "sample request is {} and can no longer be quoted",
                sample.status
            )));
        }
        let quotation = self
            .store
            .get_quotation(sample.quotation_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("quotation", sample.quotation_id))?;
        let quote = input.into_quote(id, actor.id, quotation.currency, Utc::now())?;
        self.store.insert_sample_quote(&quote).await?;
        tracing::info!(sample_id = %id, total_cost_cents = quote.total_cost_cents, "sample quoted");
        Ok(quote)
    }

    pub async fn list_samples(
        &self,
        actor: &Actor,
        mut filter: SampleFilter,
    ) -> WorkflowResult<Vec<SampleRequest>> {
        match actor.role {
            Role::Buyer => filter.buyer_id = Some(actor.id),
            Role::Supplier => filter.supplier_id = Some(actor.id),
            Role::Admin => {}
        }
        let ctx = PolicyContext::default();
        Ok(self
            .store
            .find_samples(&filter)
            .await?
            .into_iter()
            .filter(|s| s.can_view(actor, &ctx))
            .collect())
    }

    pub async fn list_sample_quotes(
        &self,
        actor: &Actor,
        id: SampleRequestId,
    ) -> WorkflowResult<Vec<SampleQuote>> {
        self.visible_sample(actor, id).await?;
        Ok(self.store.list_sample_quotes(id).await?)
    }

    async fn visible_sample(
        &self,
        actor: &Actor,
        id: SampleRequestId,
    ) -> WorkflowResult<SampleRequest> {
        self.store
            .get_sample(id)
            .await?
            .filter(|s| s.can_view(actor, &PolicyContext::default()))
            .ok_or_else(|| WorkflowError::not_found("sample request", id))
    }

    async fn transition_sample(
        &self,
        mut sample: SampleRequest,
        next: SampleStatus,
        stamp: impl FnOnce(&mut SampleRequest, chrono::DateTime<Utc>),
    ) -> WorkflowResult<SampleRequest> {
        let expected = sample.status;
        sample.status = expected.transition(next)?;
        let now = Utc::now();
        stamp(&mut sample, now);
        sample.updated_at = now;
        self.store.update_sample(&sample, expected).await?;
        tracing::info!(sample_id = %sample.id, from = %expected, to = %next, "sample status changed");
        Ok(sample)
    }
}
