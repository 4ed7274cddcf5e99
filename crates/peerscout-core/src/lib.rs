use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("normalize failed: {0}")]
    Normalize(String),
    #[error("discovery failed: {0}")]
    Discover(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("extraction failed: {0}")]
    Extract(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        /// Wait hint parsed from the provider response, if it gave one.
        retry_after_s: Option<u64>,
    },
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("output failed: {0}")]
    Output(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Raw target company description, as supplied by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInput {
    pub name: String,
    pub business_description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub primary_industry: Option<String>,
}

/// Normalized target profile. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetProfile {
    /// Short product/service bullets.
    pub products_services: Vec<String>,
    /// Short customer segment/vertical bullets.
    pub customer_segments: Vec<String>,
    #[serde(default)]
    pub sic_names: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TargetProfile {
    /// Named fallback used when normalization fails irrecoverably: a minimal
    /// profile built from the raw description instead of aborting the run.
    pub fn degraded(input: &TargetInput) -> Self {
        let head: String = input.business_description.chars().take(100).collect();
        Self {
            products_services: vec![head],
            customer_segments: vec!["Various industries".to_string()],
            sic_names: input.primary_industry.iter().cloned().collect(),
            keywords: Vec::new(),
        }
    }
}

/// One discovery hit. Discovery order is significant and drives processing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateLead {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Raw text gathered for a candidate. Empty snippets are valid extractor input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateSnippets {
    pub snippets: Vec<String>,
    pub source_urls: Vec<String>,
}

/// Structured fields extracted from a candidate's snippets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFields {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    pub business_activity: String,
    pub customer_segment: String,
    #[serde(default)]
    pub sic_industry: Option<String>,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlausibilityFailure {
    DifferentProducts,
    DifferentSegments,
    InsufficientInfo,
    Other,
}

/// External plausibility verdict for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlausibilityCheck {
    pub is_plausible: bool,
    pub reason: String,
    #[serde(default)]
    pub failure_kind: Option<PlausibilityFailure>,
}

impl PlausibilityCheck {
    /// Named failsafe used when the plausibility service itself fails: default
    /// to plausible rather than losing legitimate candidates to an outage.
    pub fn failsafe() -> Self {
        Self {
            is_plausible: true,
            reason: "plausibility check failed, defaulting to plausible".to_string(),
            failure_kind: None,
        }
    }
}

/// Terminal artifact: one accepted comparable with its scores and evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparableRecord {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    pub business_activity: String,
    pub customer_segment: String,
    #[serde(default)]
    pub sic_industry: Option<String>,
    pub validation_score: f64,
    pub service_similarity: f64,
    pub segment_similarity: f64,
    pub is_plausible: bool,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
}

impl ComparableRecord {
    pub fn has_public_listing(&self) -> bool {
        self.exchange.is_some() && self.ticker.is_some()
    }
}

/// One provenance log line: where a single field value came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub candidate_name: String,
    pub field: String,
    pub value: String,
    pub source_url: String,
}

#[async_trait::async_trait]
pub trait TargetNormalizer: Send + Sync {
    async fn normalize(&self, target: &TargetInput) -> Result<TargetProfile>;
}

#[async_trait::async_trait]
pub trait DiscoveryProvider: Send + Sync {
    fn name(&self) -> &'static str;
    /// Returns at most `max_candidates` leads, best first.
    async fn discover(&self, queries: &[String], max_candidates: usize)
        -> Result<Vec<CandidateLead>>;
}

#[async_trait::async_trait]
pub trait SnippetFetcher: Send + Sync {
    async fn fetch(&self, company_name: &str, url: Option<&str>) -> Result<CandidateSnippets>;
}

#[async_trait::async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(
        &self,
        company_name: &str,
        snippets: &CandidateSnippets,
    ) -> Result<CandidateFields>;
}

#[async_trait::async_trait]
pub trait PlausibilityJudge: Send + Sync {
    async fn judge(
        &self,
        target_products: &[String],
        target_segments: &[String],
        candidate: &CandidateFields,
    ) -> Result<PlausibilityCheck>;
}
