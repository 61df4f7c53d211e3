use std::sync::Once;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use rfqhub_common::identity::Profile;

pub mod harness;

static TRACING: Once = Once::new();

/// Route server logs to the test output once per process. `RUST_LOG` applies.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// An authenticated HTTP client bound to one profile.
#[derive(Clone)]
pub struct Session {
    pub profile: Profile,
    token: String,
    base: String,
    client: reqwest::Client,
}

impl Session {
    pub fn new(base: &str, client: reqwest::Client, token: String, profile: Profile) -> Self {
        Self {
            profile,
            token,
            base: base.to_string(),
            client,
        }
    }

    pub fn id(&self) -> String {
        self.profile.id.to_string()
    }

    /// Send a request and return the raw status and JSON body (`Null` when empty).
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> (StatusCode, Value) {
        let mut req = self
            .client
            .request(method.clone(), format!("{}{path}", self.base))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(body);
        }
        let res = req
            .send()
            .await
            .unwrap_or_else(|e| panic!("{method} {path} failed: {e}"));
        let status = res.status();
        let bytes = res.bytes().await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|e| panic!("{method} {path}: non-JSON body ({e})"))
        };
        (status, value)
    }

    /// Send and decode a successful response, panicking with the error body otherwise.
    pub async fn ok<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> T {
        let (status, value) = self.send(method.clone(), path, body).await;
        assert!(
            status.is_success(),
            "{method} {path} returned {status}: {value}"
        );
        serde_json::from_value(value)
            .unwrap_or_else(|e| panic!("{method} {path}: unexpected body shape ({e})"))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> T {
        self.ok(Method::GET, path, None::<&()>).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> T {
        self.ok(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> T {
        self.ok(Method::PUT, path, Some(body)).await
    }

    /// Expect a refusal with `status` and return the error body.
    pub async fn refused<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        status: StatusCode,
    ) -> Value {
        let (got, value) = self.send(method.clone(), path, body).await;
        assert_eq!(got, status, "{method} {path}: {value}");
        value
    }
}
