use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use rfqhub_common::alert::{Alert, AlertId};
use rfqhub_common::category::{Category, CategoryId};
use rfqhub_common::identity::{Profile, ProfileId, SupplierDetails, VerificationStatus};
use rfqhub_common::matching::Assignment;
use rfqhub_common::order::{Order, OrderId, OrderStatus, PaymentStatus};
use rfqhub_common::quotation::{Quotation, QuotationId, QuotationStatus};
use rfqhub_common::rfq::{Rfq, RfqId, RfqStatus};
use rfqhub_common::sample::{SampleQuote, SampleRequest, SampleRequestId, SampleStatus};

use super::{
    Acceptance, AssignmentFilter, Credential, EntityStore, OrderFilter, QuotationFilter,
    RfqFilter, SampleFilter, StoreError, StoreResult,
};

#[derive(Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    profiles: BTreeMap<ProfileId, Profile>,
    #[serde(default)]
    credentials: BTreeMap<ProfileId, Credential>,
    #[serde(default)]
    supplier_details: BTreeMap<ProfileId, SupplierDetails>,
    #[serde(default)]
    categories: BTreeMap<CategoryId, Category>,
    #[serde(default)]
    rfqs: BTreeMap<RfqId, Rfq>,
    #[serde(default)]
    assignments: Vec<Assignment>,
    #[serde(default)]
    quotations: BTreeMap<QuotationId, Quotation>,
    #[serde(default)]
    orders: BTreeMap<OrderId, Order>,
    #[serde(default)]
    samples: BTreeMap<SampleRequestId, SampleRequest>,
    #[serde(default)]
    sample_quotes: Vec<SampleQuote>,
    #[serde(default)]
    alerts: Vec<Alert>,
}

/// All tables behind one lock, optionally mirrored to a JSON snapshot file.
///
/// With a snapshot configured, a mutation is applied to a staged copy which
/// replaces the live tables only once it is on disk. A failed snapshot write
/// leaves both the file and memory as they were.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Volatile store; nothing survives a restart.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            snapshot_path: None,
        }
    }

    /// Load `path` if it exists and keep it updated from now on.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let tables: Tables = serde_json::from_slice(&bytes)?;
                tracing::info!(
                    path = %path.display(),
                    rfqs = tables.rfqs.len(),
                    quotations = tables.quotations.len(),
                    orders = tables.orders.len(),
                    "loaded store snapshot"
                );
                tables
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no snapshot yet, starting empty");
                Tables::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(path),
        })
    }

    /// Run `apply` under the write lock. `apply` must check before it writes:
    /// an `Err` from it is returned with nothing changed.
    async fn write<R>(
        &self,
        apply: impl FnOnce(&mut Tables) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut live = self.tables.write().await;
        let Some(path) = &self.snapshot_path else {
            return apply(&mut live);
        };
        let mut staged = live.clone();
        let out = apply(&mut staged)?;
        if let Err(e) = write_snapshot(path, &staged).await {
            tracing::error!(path = %path.display(), error = %e, "failed to write store snapshot");
            return Err(e);
        }
        *live = staged;
        Ok(out)
    }
}

async fn write_snapshot(path: &Path, tables: &Tables) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let data = serde_json::to_vec_pretty(tables)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn sorted_by_creation<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(key);
    rows
}

fn check_rfq(t: &Tables, id: RfqId, expected: RfqStatus) -> StoreResult<()> {
    let current = t
        .rfqs
        .get(&id)
        .ok_or_else(|| StoreError::not_found("rfq", id))?
        .status;
    if current != expected {
        return Err(StoreError::conflict("rfq", id, expected, current));
    }
    Ok(())
}

#[async_trait]
impl EntityStore for MemoryStore {
    // ── Profiles ──

    async fn insert_profile(&self, profile: &Profile, credential: &Credential) -> StoreResult<()> {
        self.write(|t| {
            if t.profiles.values().any(|p| p.email == profile.email) {
                return Err(StoreError::Duplicate {
                    entity: "profile",
                    field: "email",
                });
            }
            t.profiles.insert(profile.id, profile.clone());
            t.credentials.insert(profile.id, credential.clone());
            Ok(())
        })
        .await
    }

    async fn get_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn find_login(&self, email: &str) -> StoreResult<Option<(Profile, Credential)>> {
        let t = self.tables.read().await;
        let found = t
            .profiles
            .values()
            .find(|p| p.email == email)
            .and_then(|p| t.credentials.get(&p.id).map(|c| (p.clone(), c.clone())));
        Ok(found)
    }

    // ── Supplier details ──

    async fn put_supplier_details(&self, details: &SupplierDetails) -> StoreResult<()> {
        self.write(|t| {
            t.supplier_details
                .insert(details.supplier_id, details.clone());
            Ok(())
        })
        .await
    }

    async fn get_supplier_details(
        &self,
        supplier: ProfileId,
    ) -> StoreResult<Option<SupplierDetails>> {
        Ok(self.tables.read().await.supplier_details.get(&supplier).cloned())
    }

    async fn list_supplier_details(
        &self,
        status: Option<VerificationStatus>,
    ) -> StoreResult<Vec<SupplierDetails>> {
        let t = self.tables.read().await;
        Ok(t.supplier_details
            .values()
            .filter(|d| status.is_none_or(|s| d.verification_status == s))
            .cloned()
            .collect())
    }

    async fn update_verification(
        &self,
        supplier: ProfileId,
        expected: VerificationStatus,
        next: VerificationStatus,
    ) -> StoreResult<SupplierDetails> {
        self.write(|t| {
            let details = t
                .supplier_details
                .get_mut(&supplier)
                .ok_or_else(|| StoreError::not_found("supplier details", supplier))?;
            if details.verification_status != expected {
                return Err(StoreError::conflict(
                    "supplier details",
                    supplier,
                    expected,
                    details.verification_status,
                ));
            }
            details.verification_status = next;
            details.updated_at = chrono::Utc::now();
            Ok(details.clone())
        })
        .await
    }

    // ── Categories ──

    async fn put_category(&self, category: &Category) -> StoreResult<()> {
        self.write(|t| {
            if t
                .categories
                .values()
                .any(|c| c.id != category.id && c.matches_name(&category.name))
            {
                return Err(StoreError::Duplicate {
                    entity: "category",
                    field: "name",
                });
            }
            t.categories.insert(category.id, category.clone());
            Ok(())
        })
        .await
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let t = self.tables.read().await;
        let mut rows: Vec<Category> = t.categories.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<bool> {
        self.write(|t| Ok(t.categories.remove(&id).is_some())).await
    }

    // ── RFQs ──

    async fn insert_rfq(&self, rfq: &Rfq) -> StoreResult<()> {
        self.write(|t| {
            t.rfqs.insert(rfq.id, rfq.clone());
            Ok(())
        })
        .await
    }

    async fn get_rfq(&self, id: RfqId) -> StoreResult<Option<Rfq>> {
        Ok(self.tables.read().await.rfqs.get(&id).cloned())
    }

    async fn find_rfqs(&self, filter: &RfqFilter) -> StoreResult<Vec<Rfq>> {
        let t = self.tables.read().await;
        let rows: Vec<Rfq> = t.rfqs.values().filter(|r| filter.matches(r)).cloned().collect();
        Ok(sorted_by_creation(rows, |r: &Rfq| r.created_at))
    }

    async fn update_rfq(&self, rfq: &Rfq, expected: RfqStatus) -> StoreResult<()> {
        self.write(|t| {
            check_rfq(t, rfq.id, expected)?;
            t.rfqs.insert(rfq.id, rfq.clone());
            Ok(())
        })
        .await
    }

    // ── Assignments ──

    async fn commit_assignments(
        &self,
        rfq: &Rfq,
        expected: RfqStatus,
        assignments: &[Assignment],
    ) -> StoreResult<()> {
        self.write(|t| {
            check_rfq(t, rfq.id, expected)?;
            let duplicate = assignments.iter().any(|new| {
                t.assignments
                    .iter()
                    .any(|a| a.rfq_id == new.rfq_id && a.supplier_id == new.supplier_id)
            });
            if duplicate {
                return Err(StoreError::Duplicate {
                    entity: "assignment",
                    field: "supplier_ids",
                });
            }
            t.rfqs.insert(rfq.id, rfq.clone());
            t.assignments.extend_from_slice(assignments);
            Ok(())
        })
        .await
    }

    async fn find_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        let t = self.tables.read().await;
        Ok(t.assignments
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    // ── Quotations ──

    async fn commit_quotation(
        &self,
        quotation: &Quotation,
        rfq: &Rfq,
        rfq_expected: RfqStatus,
    ) -> StoreResult<()> {
        self.write(|t| {
            check_rfq(t, rfq.id, rfq_expected)?;
            let live = t.quotations.values().any(|q| {
                q.rfq_id == quotation.rfq_id
                    && q.supplier_id == quotation.supplier_id
                    && !q.status.is_terminal()
            });
            if live {
                return Err(StoreError::Duplicate {
                    entity: "quotation",
                    field: "rfq_id",
                });
            }
            t.rfqs.insert(rfq.id, rfq.clone());
            t.quotations.insert(quotation.id, quotation.clone());
            Ok(())
        })
        .await
    }

    async fn get_quotation(&self, id: QuotationId) -> StoreResult<Option<Quotation>> {
        Ok(self.tables.read().await.quotations.get(&id).cloned())
    }

    async fn find_quotations(&self, filter: &QuotationFilter) -> StoreResult<Vec<Quotation>> {
        let t = self.tables.read().await;
        let rows: Vec<Quotation> = t
            .quotations
            .values()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect();
        Ok(sorted_by_creation(rows, |q: &Quotation| q.created_at))
    }

    async fn update_quotation(
        &self,
        quotation: &Quotation,
        expected: QuotationStatus,
    ) -> StoreResult<()> {
        self.write(|t| {
            let current = t
                .quotations
                .get_mut(&quotation.id)
                .ok_or_else(|| StoreError::not_found("quotation", quotation.id))?;
            if current.status != expected {
                return Err(StoreError::conflict(
                    "quotation",
                    quotation.id,
                    expected,
                    current.status,
                ));
            }
            *current = quotation.clone();
            Ok(())
        })
        .await
    }

    async fn commit_acceptance(&self, acceptance: &Acceptance) -> StoreResult<Vec<QuotationId>> {
        let Acceptance {
            rfq,
            rfq_expected,
            quotation,
            quotation_expected,
            order,
        } = acceptance;

        self.write(|t| {
            check_rfq(t, rfq.id, *rfq_expected)?;
            let quotation_now = t
                .quotations
                .get(&quotation.id)
                .ok_or_else(|| StoreError::not_found("quotation", quotation.id))?
                .status;
            if quotation_now != *quotation_expected {
                return Err(StoreError::conflict(
                    "quotation",
                    quotation.id,
                    quotation_expected,
                    quotation_now,
                ));
            }
            if t.orders.values().any(|o| o.quotation_id == quotation.id) {
                return Err(StoreError::Duplicate {
                    entity: "order",
                    field: "quotation_id",
                });
            }

            t.rfqs.insert(rfq.id, rfq.clone());
            t.quotations.insert(quotation.id, quotation.clone());

            let mut superseded = Vec::new();
            for sibling in t.quotations.values_mut() {
                if sibling.rfq_id == rfq.id
                    && sibling.id != quotation.id
                    && sibling.status.can_transition_to(QuotationStatus::Superseded)
                {
                    sibling.status = QuotationStatus::Superseded;
                    sibling.updated_at = order.created_at;
                    superseded.push(sibling.id);
                }
            }

            t.orders.insert(order.id, order.clone());
            Ok(superseded)
        })
        .await
    }

    // ── Orders ──

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        let t = self.tables.read().await;
        let rows: Vec<Order> = t.orders.values().filter(|o| filter.matches(o)).cloned().collect();
        Ok(sorted_by_creation(rows, |o: &Order| o.created_at))
    }

    async fn update_order(
        &self,
        order: &Order,
        expected: OrderStatus,
        expected_payment: PaymentStatus,
    ) -> StoreResult<()> {
        self.write(|t| {
            let current = t
                .orders
                .get_mut(&order.id)
                .ok_or_else(|| StoreError::not_found("order", order.id))?;
            if current.status != expected {
                return Err(StoreError::conflict("order", order.id, expected, current.status));
            }
            if current.payment_status != expected_payment {
                return Err(StoreError::conflict(
                    "order payment",
                    order.id,
                    expected_payment,
                    current.payment_status,
                ));
            }
            *current = order.clone();
            Ok(())
        })
        .await
    }

    // ── Samples ──

    async fn insert_sample(&self, sample: &SampleRequest) -> StoreResult<()> {
        self.write(|t| {
            t.samples.insert(sample.id, sample.clone());
            Ok(())
        })
        .await
    }

    async fn get_sample(&self, id: SampleRequestId) -> StoreResult<Option<SampleRequest>> {
        Ok(self.tables.read().await.samples.get(&id).cloned())
    }

    async fn find_samples(&self, filter: &SampleFilter) -> StoreResult<Vec<SampleRequest>> {
        let t = self.tables.read().await;
        let rows: Vec<SampleRequest> = t.samples.values().filter(|s| filter.matches(s)).cloned().collect();
        Ok(sorted_by_creation(rows, |s: &SampleRequest| s.created_at))
    }

    async fn update_sample(
        &self,
        sample: &SampleRequest,
        expected: SampleStatus,
    ) -> StoreResult<()> {
        self.write(|t| {
            let current = t
                .samples
                .get_mut(&sample.id)
                .ok_or_else(|| StoreError::not_found("sample request", sample.id))?;
            if current.status != expected {
                return Err(StoreError::conflict(
                    "sample request",
                    sample.id,
                    expected,
                    current.status,
                ));
            }
            *current = sample.clone();
            Ok(())
        })
        .await
    }

    async fn insert_sample_quote(&self, quote: &SampleQuote) -> StoreResult<()> {
        self.write(|t| {
            t.sample_quotes.push(quote.clone());
            Ok(())
        })
        .await
    }

    async fn list_sample_quotes(&self, sample: SampleRequestId) -> StoreResult<Vec<SampleQuote>> {
        let t = self.tables.read().await;
        Ok(t.sample_quotes
            .iter()
            .filter(|q| q.sample_request_id == sample)
            .cloned()
            .collect())
    }

    // ── Alerts ──

    async fn append_alert(&self, alert: &Alert) -> StoreResult<()> {
        self.write(|t| {
            t.alerts.push(alert.clone());
            Ok(())
        })
        .await
    }

    async fn list_alerts(&self, unread_only: bool) -> StoreResult<Vec<Alert>> {
        let t = self.tables.read().await;
        Ok(t.alerts
            .iter()
            .filter(|a| !unread_only || !a.read)
            .cloned()
            .collect())
    }

    async fn mark_alert_read(&self, id: AlertId) -> StoreResult<bool> {
        self.write(|t| {
            let Some(alert) = t.alerts.iter_mut().find(|a| a.id == id) else {
                return Ok(false);
            };
            alert.read = true;
            Ok(true)
        })
        .await
    }

    async fn mark_all_alerts_read(&self) -> StoreResult<usize> {
        self.write(|t| {
            let mut changed = 0;
            for alert in t.alerts.iter_mut().filter(|a| !a.read) {
                alert.read = true;
                changed += 1;
            }
            Ok(changed)
        })
        .await
    }
}
