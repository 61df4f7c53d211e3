//! Shared fixtures for the server's unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use rfqhub_common::category::{Category, CategoryId, OnboardingRequirements, TurnoverBand};
use rfqhub_common::currency::Currency;
use rfqhub_common::identity::{Actor, Profile, Role, SupplierDetailsInput};
use rfqhub_common::quotation::NewQuotation;
use rfqhub_common::rfq::NewRfq;

use crate::engine::Engine;
use crate::insights::{InsightError, InsightService, LanguageModel};
use crate::store::{Credential, EntityStore, MemoryStore};

pub(crate) fn new_rfq(category: &str) -> NewRfq {
    NewRfq {
        title: "Cotton T-Shirts".into(),
        category: category.into(),
        description: "Plain crew neck, 180 GSM, assorted sizes".into(),
        quantity: 5000,
        unit: "pieces".into(),
        currency: Currency::Usd,
        target_price_cents: Some(350),
        max_price_cents: None,
        delivery_timeline: Some("60 days".into()),
        delivery_location: Some("Rotterdam".into()),
        shipping_terms: Some("FOB".into()),
        quality_requirements: None,
        certifications_required: None,
        open_for_bidding: false,
    }
}

pub(crate) fn offer(price_per_unit_cents: u64, moq: u64) -> NewQuotation {
    NewQuotation {
        price_per_unit_cents,
        moq,
        lead_time_days: 45,
        payment_terms: Some("30% advance".into()),
        shipping_terms: Some("FOB".into()),
        validity_days: 30,
        quality_guarantee: true,
        sample_available: true,
        notes: None,
    }
}

pub(crate) fn details(category: &str) -> SupplierDetailsInput {
    SupplierDetailsInput {
        product_categories: [category.to_string()].into(),
        certifications: ["ISO 9001".to_string()].into(),
        years_in_business: 5,
        annual_turnover: TurnoverBand::From1MTo10M,
    }
}

pub(crate) fn category(name: &str) -> Category {
    Category {
        id: CategoryId::new(),
        name: name.into(),
        description: String::new(),
        requirements: OnboardingRequirements::default(),
    }
}

/// Always replies with the same text.
pub(crate) struct CannedModel(pub String);

#[async_trait]
impl LanguageModel for CannedModel {
    async fn chat_complete(&self, _: &str, _: &str) -> Result<String, InsightError> {
        Ok(self.0.clone())
    }
}

/// Always fails as an upstream 503.
pub(crate) struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn chat_complete(&self, _: &str, _: &str) -> Result<String, InsightError> {
        Err(InsightError::Upstream {
            status: 503,
            body: "overloaded".into(),
        })
    }
}

/// Sleeps before answering.
pub(crate) struct SlowModel(pub Duration);

#[async_trait]
impl LanguageModel for SlowModel {
    async fn chat_complete(&self, _: &str, _: &str) -> Result<String, InsightError> {
        tokio::time::sleep(self.0).await;
        Ok("{}".into())
    }
}

/// An engine over a fresh in-memory store, with a model that always fails.
pub(crate) struct World {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub admin: Actor,
}

impl World {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let insights = InsightService::new(Arc::new(FailingModel), Duration::from_millis(100));
        let engine = Engine::new(store.clone(), insights);
        let admin = Self::profile(&store, Role::Admin, "admin@rfqhub.test").await;
        for name in ["Apparel", "Spices", "Electronics"] {
            store.put_category(&category(name)).await.unwrap();
        }
        Self {
            engine,
            store,
            admin,
        }
    }

    async fn profile(store: &MemoryStore, role: Role, email: &str) -> Actor {
        let profile = Profile::new(role, email, email, None, None, Utc::now()).unwrap();
        let credential = Credential {
            salt: String::new(),
            digest: String::new(),
        };
        store.insert_profile(&profile, &credential).await.unwrap();
        profile.actor()
    }

    pub async fn buyer(&self, email: &str) -> Actor {
        Self::profile(&self.store, Role::Buyer, email).await
    }

    /// A supplier in `category`, verified by the admin.
    pub async fn verified_supplier(&self, email: &str, category: &str) -> Actor {
        let supplier = Self::profile(&self.store, Role::Supplier, email).await;
        self.engine
            .submit_supplier_details(&supplier, details(category))
            .await
            .unwrap();
        self.engine
            .verify_supplier(&self.admin, supplier.id, true)
            .await
            .unwrap();
        supplier
    }

    pub async fn pending_supplier(&self, email: &str, category: &str) -> Actor {
        let supplier = Self::profile(&self.store, Role::Supplier, email).await;
        self.engine
            .submit_supplier_details(&supplier, details(category))
            .await
            .unwrap();
        supplier
    }
}
