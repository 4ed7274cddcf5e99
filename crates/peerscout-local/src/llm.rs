//! OpenAI-compatible chat client plus the model-backed services built on it:
//! target normalization, candidate field extraction, and plausibility
//! judgement. Responses are requested as JSON objects and parsed strictly;
//! transport failures are classified into the error taxonomy so the call
//! governor can schedule retries.

use once_cell::sync::Lazy;
use peerscout_core::{
    CandidateFields, CandidateSnippets, Error, PlausibilityCheck, PlausibilityFailure, Result,
    TargetInput, TargetProfile,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const CHAT_TIMEOUT_MS: u64 = 90_000;
const MAX_SNIPPET_CHARS: usize = 6_000;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn base_url_from_env() -> String {
    env("PEERSCOUT_OPENAI_COMPAT_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

fn api_key_from_env() -> Option<String> {
    env("PEERSCOUT_OPENAI_COMPAT_API_KEY")
}

fn model_from_env() -> Option<String> {
    env("PEERSCOUT_OPENAI_COMPAT_MODEL")
}

/// Providers often embed "Please try again in 23s" in 429 bodies. We add a
/// small buffer on top of whatever they ask for.
static RETRY_AFTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"try again in (\d+)").expect("static regex"));

fn parse_retry_after(body: &str) -> Option<u64> {
    RETRY_AFTER_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|s| s + 2)
}

/// Map a failed chat.completions response onto the error taxonomy. Status
/// codes are authoritative; body substrings are a fallback for providers
/// that tunnel everything through 400/500.
fn classify_chat_failure(status: reqwest::StatusCode, body: &str) -> Error {
    let lowered = body.to_lowercase();
    if status.as_u16() == 402
        || lowered.contains("insufficient_quota")
        || lowered.contains("quota")
        || lowered.contains("billing hard limit")
    {
        return Error::QuotaExhausted(format!("chat.completions HTTP {status}: {body}"));
    }
    if status.as_u16() == 429
        || lowered.contains("rate limit")
        || lowered.contains("rate_limit")
        || lowered.contains("rpm")
    {
        return Error::RateLimited {
            message: format!("chat.completions HTTP {status}: {body}"),
            retry_after_s: parse_retry_after(&lowered),
        };
    }
    Error::Llm(format!("chat.completions HTTP {status}: {body}"))
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Self {
        let model = model_override
            .or_else(model_from_env)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            client,
            base_url: base_url_from_env(),
            api_key: api_key_from_env(),
            model,
        }
    }

    #[cfg(test)]
    pub fn for_tests(client: reqwest::Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: None,
            model: model.to_string(),
        }
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }

    /// One chat turn, JSON-object response format, returning the first
    /// choice's content.
    pub async fn chat_json(&self, system: &str, user: &str) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: Some(0.0),
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(CHAT_TIMEOUT_MS))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_chat_failure(status, &body));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Model responses sometimes arrive fenced despite the JSON response format.
fn strip_code_fence(s: &str) -> &str {
    let t = s.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}

fn parse_json<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T> {
    serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| Error::Llm(format!("malformed model JSON: {e}")))
}

/// All three model-backed pipeline services share one client.
#[derive(Debug, Clone)]
pub struct LlmServices {
    client: OpenAiCompatClient,
}

impl LlmServices {
    pub fn new(client: OpenAiCompatClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileDto {
    #[serde(default)]
    products_services: Vec<String>,
    #[serde(default)]
    customer_segments: Vec<String>,
    #[serde(default)]
    sic_names: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

#[async_trait::async_trait]
impl peerscout_core::TargetNormalizer for LlmServices {
    async fn normalize(&self, target: &TargetInput) -> Result<TargetProfile> {
        let system = "You analyze company descriptions for a comparable-company search. \
                      Respond with a single JSON object only.";
        let user = format!(
            "Company: {}\nDescription: {}\nIndustry hint: {}\n\n\
             Return JSON with keys:\n\
             - products_services: up to 8 short bullets naming concrete offerings\n\
             - customer_segments: up to 6 short bullets naming who buys them\n\
             - sic_names: up to 3 standard industry classification names\n\
             - keywords: up to 10 single-word search keywords",
            target.name,
            target.business_description,
            target.primary_industry.as_deref().unwrap_or("none"),
        );
        let raw = self.client.chat_json(system, &user).await?;
        let dto: ProfileDto = parse_json(&raw)?;
        if dto.products_services.is_empty() {
            return Err(Error::Normalize(
                "model returned no products_services bullets".to_string(),
            ));
        }
        Ok(TargetProfile {
            products_services: dto.products_services,
            customer_segments: dto.customer_segments,
            sic_names: dto.sic_names,
            keywords: dto.keywords,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FieldsDto {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    business_activity: String,
    #[serde(default)]
    customer_segment: String,
    #[serde(default)]
    sic_industry: Option<String>,
    #[serde(default)]
    evidence_urls: Vec<String>,
}

fn nonempty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[async_trait::async_trait]
impl peerscout_core::FieldExtractor for LlmServices {
    async fn extract(
        &self,
        company_name: &str,
        snippets: &CandidateSnippets,
    ) -> Result<CandidateFields> {
        let mut text = snippets.snippets.join("\n---\n");
        if text.chars().count() > MAX_SNIPPET_CHARS {
            text = text.chars().take(MAX_SNIPPET_CHARS).collect();
        }
        let system = "You extract structured facts about companies from web text. \
                      Use only what the text supports. Respond with a single JSON object only.";
        let user = format!(
            "Company: {company_name}\nSource text:\n{text}\n\n\
             Return JSON with keys:\n\
             - name: canonical company name\n\
             - url: main website, or null\n\
             - exchange: stock exchange, or null\n\
             - ticker: ticker symbol, or null\n\
             - business_activity: one sentence on what the company sells or does\n\
             - customer_segment: one sentence on who its customers are\n\
             - sic_industry: closest standard industry classification name, or null\n\
             - evidence_urls: the source URLs the facts came from",
        );
        let raw = self.client.chat_json(system, &user).await?;
        let dto: FieldsDto = parse_json(&raw)?;
        if dto.business_activity.trim().is_empty() {
            return Err(Error::Extract(format!(
                "no business activity extracted for {company_name}"
            )));
        }
        let mut evidence_urls = dto.evidence_urls;
        if evidence_urls.is_empty() {
            evidence_urls = snippets.source_urls.clone();
        }
        Ok(CandidateFields {
            name: nonempty(dto.name).unwrap_or_else(|| company_name.to_string()),
            url: nonempty(dto.url).or_else(|| snippets.source_urls.first().cloned()),
            exchange: nonempty(dto.exchange),
            ticker: nonempty(dto.ticker),
            business_activity: dto.business_activity.trim().to_string(),
            customer_segment: dto.customer_segment.trim().to_string(),
            sic_industry: nonempty(dto.sic_industry),
            evidence_urls,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PlausibilityDto {
    is_plausible: bool,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    failure_kind: Option<String>,
}

fn failure_kind(s: &str) -> PlausibilityFailure {
    match s {
        "different_products" => PlausibilityFailure::DifferentProducts,
        "different_segments" => PlausibilityFailure::DifferentSegments,
        "insufficient_info" => PlausibilityFailure::InsufficientInfo,
        _ => PlausibilityFailure::Other,
    }
}

#[async_trait::async_trait]
impl peerscout_core::PlausibilityJudge for LlmServices {
    async fn judge(
        &self,
        target_products: &[String],
        target_segments: &[String],
        candidate: &CandidateFields,
    ) -> Result<PlausibilityCheck> {
        let system = "You judge whether two companies are plausible business comparables. \
                      Respond with a single JSON object only.";
        let user = format!(
            "Target products/services:\n- {}\nTarget customer segments:\n- {}\n\n\
             Candidate: {}\nCandidate activity: {}\nCandidate customers: {}\n\n\
             Return JSON with keys:\n\
             - is_plausible: true if the candidate plausibly competes for similar \
               customers with similar offerings\n\
             - reason: one sentence\n\
             - failure_kind: when not plausible, one of different_products, \
               different_segments, insufficient_info, other; else null",
            target_products.join("\n- "),
            target_segments.join("\n- "),
            candidate.name,
            candidate.business_activity,
            candidate.customer_segment,
        );
        let raw = self.client.chat_json(system, &user).await?;
        let dto: PlausibilityDto = parse_json(&raw)?;
        Ok(PlausibilityCheck {
            is_plausible: dto.is_plausible,
            reason: dto.reason,
            failure_kind: if dto.is_plausible {
                None
            } else {
                Some(failure_kind(dto.failure_kind.as_deref().unwrap_or("other")))
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerscout_core::FieldExtractor;

    #[test]
    fn http_429_classifies_as_rate_limited_with_wait_hint() {
        let e = classify_chat_failure(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "Rate limit reached. Please try again in 23s.",
        );
        match e {
            Error::RateLimited { retry_after_s, .. } => assert_eq!(retry_after_s, Some(25)),
            other => panic!("wrong classification: {other}"),
        }
    }

    #[test]
    fn http_429_without_hint_has_no_retry_after() {
        let e = classify_chat_failure(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        match e {
            Error::RateLimited { retry_after_s, .. } => assert_eq!(retry_after_s, None),
            other => panic!("wrong classification: {other}"),
        }
    }

    #[test]
    fn quota_body_substring_beats_generic_status() {
        let e = classify_chat_failure(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"insufficient_quota"}}"#,
        );
        assert!(matches!(e, Error::QuotaExhausted(_)));
    }

    #[test]
    fn http_402_classifies_as_quota() {
        let e = classify_chat_failure(
            reqwest::StatusCode::PAYMENT_REQUIRED,
            "payment required",
        );
        assert!(matches!(e, Error::QuotaExhausted(_)));
    }

    #[test]
    fn rate_limit_substring_on_server_error() {
        let e = classify_chat_failure(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "upstream RPM exceeded",
        );
        assert!(matches!(e, Error::RateLimited { .. }));
    }

    #[test]
    fn unrecognized_failure_stays_generic() {
        let e = classify_chat_failure(reqwest::StatusCode::BAD_GATEWAY, "bad gateway");
        assert!(matches!(e, Error::Llm(_)));
    }

    #[test]
    fn code_fences_are_stripped_before_parsing() {
        let raw = "```json\n{\"is_plausible\": true, \"reason\": \"ok\"}\n```";
        let dto: PlausibilityDto = parse_json(raw).unwrap();
        assert!(dto.is_plausible);
    }

    async fn stub_server(body: &'static str) -> String {
        use axum::{routing::post, Router};
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || async move {
                (
                    [(axum::http::header::CONTENT_TYPE, "application/json")],
                    body,
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn extractor_backfills_url_and_evidence_from_snippets() {
        let body = r#"{"choices":[{"message":{"content":
            "{\"business_activity\":\"Cloud consulting.\",\"customer_segment\":\"Enterprises.\"}"
        }}]}"#;
        let base = stub_server(body).await;
        let svc = LlmServices::new(OpenAiCompatClient::for_tests(
            reqwest::Client::new(),
            &base,
            "test-model",
        ));
        let snippets = CandidateSnippets {
            snippets: vec!["Acme provides cloud consulting.".to_string()],
            source_urls: vec!["https://acme.example".to_string()],
        };
        let fields = svc.extract("Acme", &snippets).await.unwrap();
        assert_eq!(fields.name, "Acme");
        assert_eq!(fields.url.as_deref(), Some("https://acme.example"));
        assert_eq!(fields.evidence_urls, vec!["https://acme.example"]);
        assert_eq!(fields.business_activity, "Cloud consulting.");
    }

    #[tokio::test]
    async fn extractor_rejects_empty_business_activity() {
        let body = r#"{"choices":[{"message":{"content":
            "{\"business_activity\":\"  \",\"customer_segment\":\"x\"}"
        }}]}"#;
        let base = stub_server(body).await;
        let svc = LlmServices::new(OpenAiCompatClient::for_tests(
            reqwest::Client::new(),
            &base,
            "test-model",
        ));
        let err = svc
            .extract("Acme", &CandidateSnippets::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extract(_)));
    }
}
