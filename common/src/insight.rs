//! Response shapes for the language-model adapter.
//!
//! Each shape owns its parsing rules and a static fallback returned whenever the
//! upstream call fails, times out, or replies with something unparseable.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A kind of structured answer requested from the model.
pub trait InsightShape: Serialize + DeserializeOwned + Clone {
    /// Short name used in logs.
    const KIND: &'static str;

    /// JSON skeleton appended to the prompt so the model knows what to return.
    fn response_shape() -> &'static str;

    /// Deterministic value used when the model cannot be reached or understood.
    fn fallback() -> Self;

    /// Clamp or tidy a successfully parsed reply.
    fn sanitize(self) -> Self {
        self
    }

    /// Parse a raw model reply. Markdown fences and chatter around the JSON
    /// object are ignored.
    fn parse_reply(reply: &str) -> Result<Self, serde_json::Error> {
        let parsed: Self = serde_json::from_str(extract_json_object(reply))?;
        Ok(parsed.sanitize())
    }
}

/// Slice from the first `{` to the last `}`; the whole input if there is none.
pub fn extract_json_object(reply: &str) -> &str {
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply.trim(),
    }
}

/// Summary attached to an RFQ on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqSummary {
    pub summary: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl InsightShape for RfqSummary {
    const KIND: &'static str = "rfq_summary";

    fn response_shape() -> &'static str {
        r#"{"summary": "<two sentence summary>", "categories": ["<product category>"]}"#
    }

    fn fallback() -> Self {
        RfqSummary {
            summary: "Automatic summary unavailable; review the request details.".into(),
            categories: vec!["General".into()],
        }
    }

    fn sanitize(mut self) -> Self {
        self.summary = self.summary.trim().to_string();
        self.categories.retain(|c| !c.trim().is_empty());
        if self.summary.is_empty() {
            return Self::fallback();
        }
        self
    }
}

/// Advisory scoring of a quotation against its RFQ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationAnalysis {
    /// 0 (poor fit) to 100 (excellent fit).
    pub score: u8,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    pub recommendation: String,
}

impl InsightShape for QuotationAnalysis {
    const KIND: &'static str = "quotation_analysis";

    fn response_shape() -> &'static str {
        r#"{"score": <0-100>, "strengths": ["..."], "risks": ["..."], "recommendation": "..."}"#
    }

    fn fallback() -> Self {
        QuotationAnalysis {
            score: 50,
            strengths: Vec::new(),
            risks: vec!["Automatic analysis unavailable".into()],
            recommendation: "Review this quotation manually.".into(),
        }
    }

    fn sanitize(mut self) -> Self {
        self.score = self.score.min(100);
        self
    }
}
