use std::sync::Arc;

use chrono::Utc;

use rfqhub_common::alert::{Alert, AlertId, AlertKind};
use rfqhub_common::error::{WorkflowError, WorkflowResult};
use rfqhub_common::identity::{Actor, Role};

use crate::store::EntityStore;

/// Append-only record of events an admin should look at.
///
/// Recording never fails the action that caused it: a store error is logged and
/// the alert is dropped.
#[derive(Clone)]
pub struct AlertSink {
    store: Arc<dyn EntityStore>,
}

impl AlertSink {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, kind: AlertKind) {
        let alert = Alert::new(kind, Utc::now());
        match self.store.append_alert(&alert).await {
            Ok(()) => tracing::info!(
                alert_id = %alert.id,
                rfq_id = %alert.kind.rfq_id(),
                priority = ?alert.priority,
                "alert recorded"
            ),
            Err(e) => tracing::error!(error = %e, kind = ?alert.kind, "failed to record alert"),
        }
    }

    pub async fn list(&self, actor: &Actor, unread_only: bool) -> WorkflowResult<Vec<Alert>> {
        actor.require(Role::Admin)?;
        let mut alerts = self.store.list_alerts(unread_only).await?;
        alerts.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(alerts)
    }

    pub async fn mark_read(&self, actor: &Actor, id: AlertId) -> WorkflowResult<()> {
        actor.require(Role::Admin)?;
        if !self.store.mark_alert_read(id).await? {
            return Err(WorkflowError::not_found("alert", id));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, actor: &Actor) -> WorkflowResult<usize> {
        actor.require(Role::Admin)?;
        Ok(self.store.mark_all_alerts_read().await?)
    }
}
