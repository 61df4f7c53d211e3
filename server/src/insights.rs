//! Language-model adapter.
//!
//! [`InsightService`] never fails: any upstream error, timeout, or unparseable
//! reply is logged and replaced by the shape's static fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use rfqhub_common::currency::format_amount;
use rfqhub_common::insight::{InsightShape, QuotationAnalysis, RfqSummary};
use rfqhub_common::quotation::Quotation;
use rfqhub_common::rfq::Rfq;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You assist procurement administrators on a B2B sourcing \
marketplace. Answer with a single JSON object and nothing else.";

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("completion contained no choices")]
    Empty,
}

/// Anything that can turn a prompt into raw completion text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn chat_complete(&self, prompt: &str, response_shape: &str)
        -> Result<String, InsightError>;
}

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAiCompatible {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatible {
    pub fn new(url: impl Into<String>, api_key: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatible {
    async fn chat_complete(
        &self,
        prompt: &str,
        response_shape: &str,
    ) -> Result<String, InsightError> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("{prompt}\n\nRespond with JSON shaped like:\n{response_shape}")}
            ],
            "temperature": 0.2,
            "response_format": {"type": "json_object"}
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::Upstream { status, body });
        }

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let parsed: ApiResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(InsightError::Empty)
    }
}

/// Summaries and scores attached to RFQs and quotations.
#[derive(Clone)]
pub struct InsightService {
    model: Option<Arc<dyn LanguageModel>>,
    timeout: Duration,
}

impl InsightService {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            model: Some(model),
            timeout,
        }
    }

    /// Every call returns the fallback.
    pub fn disabled() -> Self {
        Self {
            model: None,
            timeout: Duration::ZERO,
        }
    }

    pub async fn summarize_rfq(&self, rfq: &Rfq) -> RfqSummary {
        let mut prompt = format!(
            "Summarise this sourcing request in two sentences and list its product categories.\n\
             Title: {}\nCategory: {}\nQuantity: {} {}\nDescription: {}",
            rfq.title, rfq.category, rfq.quantity, rfq.unit, rfq.description
        );
        if let Some(target) = rfq.target_price_cents {
            prompt.push_str(&format!(
                "\nTarget unit price: {}",
                format_amount(target, &rfq.currency)
            ));
        }
        if let Some(q) = &rfq.quality_requirements {
            prompt.push_str(&format!("\nQuality requirements: {q}"));
        }
        self.ask(&prompt).await
    }

    pub async fn analyze_quotation(&self, rfq: &Rfq, quotation: &Quotation) -> QuotationAnalysis {
        let prompt = format!(
            "Score this supplier quotation from 0 to 100 against the buyer's request.\n\
             Request: {} ({} {}, target {})\n\
             Quotation: unit price {}, MOQ {}, lead time {} days, payment terms {}, \
             quality guarantee {}, samples {}",
            rfq.title,
            rfq.quantity,
            rfq.unit,
            rfq.target_price_cents
                .map(|t| format_amount(t, &rfq.currency))
                .unwrap_or_else(|| "none".into()),
            format_amount(quotation.price_per_unit_cents, &quotation.currency),
            quotation.moq,
            quotation.lead_time_days,
            quotation.payment_terms.as_deref().unwrap_or("unspecified"),
            quotation.quality_guarantee,
            quotation.sample_available,
        );
        self.ask(&prompt).await
    }

    async fn ask<S: InsightShape>(&self, prompt: &str) -> S {
        let Some(model) = &self.model else {
            tracing::debug!(kind = S::KIND, "no language model configured, using fallback");
            return S::fallback();
        };

        let reply = tokio::time::timeout(
            self.timeout,
            model.chat_complete(prompt, S::response_shape()),
        )
        .await;

        match reply {
            Ok(Ok(text)) => match S::parse_reply(&text) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(kind = S::KIND, error = %e, "unparseable model reply, using fallback");
                    S::fallback()
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(kind = S::KIND, error = %e, "model call failed, using fallback");
                S::fallback()
            }
            Err(_) => {
                tracing::warn!(
                    kind = S::KIND,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "model call timed out, using fallback"
                );
                S::fallback()
            }
        }
    }
}
