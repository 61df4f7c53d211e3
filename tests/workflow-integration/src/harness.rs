use std::net::SocketAddr;

use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tempfile::TempDir;

use rfqhub_common::category::{Category, OnboardingRequirements, TurnoverBand};
use rfqhub_common::currency::Currency;
use rfqhub_common::identity::{Profile, SupplierDetails, SupplierDetailsInput};
use rfqhub_common::quotation::NewQuotation;
use rfqhub_common::rfq::NewRfq;
use rfqhub_server::config::Config;
use rfqhub_server::engine::CategoryInput;

use crate::{init_tracing, Session};

pub const ADMIN_EMAIL: &str = "ops@rfqhub.test";
const ADMIN_PASSWORD: &str = "harness-admin-pass";
const PASSWORD: &str = "harness-pass";

/// Nothing listens on the discard port, so every model call fails fast.
const DEAD_LLM: &str = "http://127.0.0.1:9/v1/chat/completions";

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
    profile: Profile,
}

/// A running server with an admin, two buyers and two verified suppliers.
///
/// - alice, bob: buyers
/// - gary: verified, Apparel
/// - emma: verified, Spices
pub struct TestHarness {
    pub base: String,
    pub admin: Session,
    pub alice: Session,
    pub bob: Session,
    pub gary: Session,
    pub emma: Session,
    client: reqwest::Client,
    _files: TempDir,
}

impl TestHarness {
    pub async fn setup() -> Self {
        init_tracing();
        let files = tempfile::tempdir().unwrap();
        let config = Config::try_parse_from([
            "rfqhub-server",
            "--in-memory",
            "--jwt-secret",
            "harness-secret",
            "--files-dir",
            files.path().to_str().unwrap(),
            "--admin-email",
            ADMIN_EMAIL,
            "--admin-password",
            ADMIN_PASSWORD,
            "--llm-url",
            DEAD_LLM,
            "--llm-timeout-secs",
            "2",
        ])
        .unwrap();
        let app = rfqhub_server::build_app(&config).await.unwrap();

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base = format!("http://{addr}");
        let client = reqwest::Client::new();
        let admin = log_in(&client, &base, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        for name in ["Apparel", "Spices", "Electronics"] {
            let _: Category = admin
                .put(
                    "/admin/categories",
                    &CategoryInput {
                        id: None,
                        name: name.into(),
                        description: format!("{name} sourcing"),
                        requirements: OnboardingRequirements::default(),
                    },
                )
                .await;
        }

        let alice = sign_up(&client, &base, "buyer", "Alice").await;
        let bob = sign_up(&client, &base, "buyer", "Bob").await;

        let mut h = Self {
            gary: sign_up(&client, &base, "supplier", "Gary").await,
            emma: sign_up(&client, &base, "supplier", "Emma").await,
            base,
            admin,
            alice,
            bob,
            client,
            _files: files,
        };
        h.gary = h.onboard(h.gary.clone(), "Apparel", true).await;
        h.emma = h.onboard(h.emma.clone(), "Spices", true).await;
        h
    }

    /// A fresh supplier registered in `category`, left pending review.
    pub async fn pending_supplier(&self, name: &str, category: &str) -> Session {
        let supplier = sign_up(&self.client, &self.base, "supplier", name).await;
        self.onboard(supplier, category, false).await
    }

    async fn onboard(&self, supplier: Session, category: &str, verify: bool) -> Session {
        let _: SupplierDetails = supplier
            .put(
                "/suppliers/me/details",
                &SupplierDetailsInput {
                    product_categories: [category.to_string()].into(),
                    certifications: ["ISO 9001".to_string()].into(),
                    years_in_business: 8,
                    annual_turnover: TurnoverBand::From1MTo10M,
                },
            )
            .await;
        if verify {
            let _: SupplierDetails = self
                .admin
                .post(
                    &format!("/admin/suppliers/{}/verify", supplier.id()),
                    &json!({ "verified": true }),
                )
                .await;
        }
        supplier
    }
}

async fn sign_up(client: &reqwest::Client, base: &str, role: &str, name: &str) -> Session {
    let res = client
        .post(format!("{base}/auth/signup"))
        .json(&json!({
            "role": role,
            "display_name": name,
            "email": format!("{}@rfqhub.test", name.to_lowercase()),
            "password": PASSWORD,
            "company_name": format!("{name} Trading"),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED, "signup {name}");
    let auth: AuthResponse = res.json().await.unwrap();
    Session::new(base, client.clone(), auth.token, auth.profile)
}

async fn log_in(client: &reqwest::Client, base: &str, email: &str, password: &str) -> Session {
    let res = client
        .post(format!("{base}/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success(), "login {email}: {}", res.status());
    let auth: AuthResponse = res.json().await.unwrap();
    Session::new(base, client.clone(), auth.token, auth.profile)
}

/// The cotton t-shirt request used across the scenarios.
pub fn tshirt_rfq() -> NewRfq {
    NewRfq {
        title: "Cotton T-Shirts".into(),
        category: "Apparel".into(),
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

pub fn offer(price_per_unit_cents: u64, moq: u64) -> NewQuotation {
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
