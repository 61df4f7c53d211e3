use chrono::Utc;
use serde::{Deserialize, Serialize};

use rfqhub_common::error::{WorkflowError, WorkflowResult};
use rfqhub_common::identity::{Actor, Role};
use rfqhub_common::order::{Order, OrderId, OrderStatus, PaymentStatus, Tracking};
use rfqhub_common::policy::{Field, Guarded, PolicyContext};

use super::Engine;
use crate::store::OrderFilter;

/// Next fulfilment step. Moving to `shipped` needs carrier and tracking number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceOrder {
    pub status: OrderStatus,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

impl Engine {
    pub async fn list_orders(&self, actor: &Actor, mut filter: OrderFilter) -> WorkflowResult<Vec<Order>> {
        match actor.role {
            Role::Buyer => filter.buyer_id = Some(actor.id),
            Role::Supplier => filter.supplier_id = Some(actor.id),
            Role::Admin => {}
        }
        let ctx = PolicyContext::default();
        Ok(self
            .store
            .find_orders(&filter)
            .await?
            .into_iter()
            .filter(|o| o.can_view(actor, &ctx))
            .collect())
    }

    pub async fn get_order(&self, actor: &Actor, id: OrderId) -> WorkflowResult<Order> {
        self.store
            .get_order(id)
            .await?
            .filter(|o| o.can_view(actor, &PolicyContext::default()))
            .ok_or_else(|| WorkflowError::not_found("order", id))
    }

    /// Supplier (or admin) moves an order one step along fulfilment.
    pub async fn advance_order(
        &self,
        actor: &Actor,
        id: OrderId,
        input: AdvanceOrder,
    ) -> WorkflowResult<Order> {
        let order = self.get_order(actor, id).await?;
        if !order.can_mutate(actor, Field::Status, &PolicyContext::default()) {
            return Err(WorkflowError::forbidden(
                "only the supplier or an admin may advance an order",
            ));
        }
        if !order.status.can_transition_to(input.status) {
            return Err(WorkflowError::invalid_transition(
                "order",
                order.status,
                input.status,
            ));
        }

        let now = Utc::now();
        let mut next = order.clone();
        next.status = input.status;
        next.updated_at = now;
        if input.status == OrderStatus::Shipped {
            let tracking = Tracking::new(
                input.carrier.as_deref().unwrap_or_default(),
                input.tracking_number.as_deref().unwrap_or_default(),
                now,
            )?;
            next.tracking = Some(tracking);
        }

        self.store
            .update_order(&next, order.status, order.payment_status)
            .await?;
        tracing::info!(order_id = %id, from = %order.status, to = %next.status, "order advanced");
        Ok(next)
    }

    /// Admin records payment progress. Never moves backwards.
    pub async fn record_payment(
        &self,
        actor: &Actor,
        id: OrderId,
        payment: PaymentStatus,
    ) -> WorkflowResult<Order> {
        actor.require(Role::Admin)?;
        let order = self.get_order(actor, id).await?;
        if !order.payment_status.can_advance_to(payment) {
            return Err(WorkflowError::invalid_transition(
                "order payment",
                order.payment_status,
                payment,
            ));
        }
        let mut next = order.clone();
        next.payment_status = payment;
        next.updated_at = Utc::now();
        self.store
            .update_order(&next, order.status, order.payment_status)
            .await?;
        tracing::info!(order_id = %id, from = %order.payment_status, to = %payment, "payment recorded");
        Ok(next)
    }
}
