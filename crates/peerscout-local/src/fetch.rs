//! Snippet fetcher: pulls a bounded amount of readable text about a
//! candidate from its website and Wikipedia. Individual source failures are
//! skipped; a candidate with no reachable source still gets a minimal
//! synthetic snippet so extraction has something to refuse on.

use futures_util::StreamExt;
use peerscout_core::{CandidateSnippets, Error, Result, SnippetFetcher};
use std::io::Cursor;
use std::time::Duration;

const MAX_BODY_BYTES: usize = 1_500_000;
const MAX_SNIPPET_CHARS: usize = 2_000;
const MAX_SNIPPETS_PER_CANDIDATE: usize = 4;
const TEXT_WIDTH: usize = 100;

/// Corporate suffixes stripped when retrying a Wikipedia title.
const NAME_SUFFIXES: [&str; 5] = ["Inc", "Inc.", "Corporation", "Corp", "Ltd"];

/// Paragraphs mentioning these words carry the signal extraction needs.
const SIGNAL_WORDS: [&str; 8] = [
    "about", "products", "services", "customers", "clients", "provides", "offers", "company",
];

pub fn shared_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("peerscout/0.1")
        .redirect(reqwest::redirect::Policy::limited(10))
        // avoid hanging the whole pipeline on one stalled host
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn wikipedia_url(base: &str, title: &str) -> String {
    let slug: String = title
        .trim()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    format!(
        "{}/wiki/{}",
        base.trim_end_matches('/'),
        url::form_urlencoded::byte_serialize(slug.as_bytes()).collect::<String>()
    )
}

fn strip_suffix_title(name: &str) -> Option<String> {
    let trimmed = name.trim().trim_end_matches(',');
    for suffix in NAME_SUFFIXES {
        if let Some(stem) = trimmed.strip_suffix(suffix) {
            let stem = stem.trim().trim_end_matches(',').trim();
            if !stem.is_empty() && stem != trimmed {
                return Some(stem.to_string());
            }
        }
    }
    None
}

/// Pick the paragraphs most likely to describe what the company does, in
/// document order, bounded per snippet.
fn select_snippets(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for para in text.split("\n\n") {
        let p = norm_ws(para);
        if p.chars().count() < 80 {
            continue;
        }
        let lowered = p.to_lowercase();
        if SIGNAL_WORDS.iter().any(|w| lowered.contains(w)) {
            let clipped: String = p.chars().take(MAX_SNIPPET_CHARS).collect();
            out.push(clipped);
        }
        if out.len() >= MAX_SNIPPETS_PER_CANDIDATE {
            break;
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct WebSnippetFetcher {
    client: reqwest::Client,
    wiki_base: String,
}

impl WebSnippetFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            wiki_base: "https://en.wikipedia.org".to_string(),
        }
    }

    #[cfg(test)]
    fn with_wiki_base(client: reqwest::Client, wiki_base: &str) -> Self {
        Self {
            client,
            wiki_base: wiki_base.to_string(),
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("GET {url} -> HTTP {status}")));
        }

        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > MAX_BODY_BYTES {
                let can_take = MAX_BODY_BYTES.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        let html = String::from_utf8_lossy(&bytes).to_string();
        Ok(html2text::from_read(Cursor::new(html.as_bytes()), TEXT_WIDTH)
            .unwrap_or_else(|_| html))
    }

    /// Wikipedia lookup with a suffix-stripped retry ("Acme Corp" often
    /// lives at "Acme").
    async fn fetch_wikipedia(&self, company_name: &str) -> Option<(String, String)> {
        let mut titles = vec![company_name.to_string()];
        if let Some(stem) = strip_suffix_title(company_name) {
            titles.push(stem);
        }
        for title in titles {
            let url = wikipedia_url(&self.wiki_base, &title);
            match self.fetch_text(&url).await {
                Ok(text) => return Some((url, text)),
                Err(e) => tracing::debug!(%url, error = %e, "wikipedia fetch failed"),
            }
        }
        None
    }
}

#[async_trait::async_trait]
impl SnippetFetcher for WebSnippetFetcher {
    async fn fetch(&self, company_name: &str, url: Option<&str>) -> Result<CandidateSnippets> {
        let mut snippets = Vec::new();
        let mut source_urls = Vec::new();

        if let Some(url) = url {
            match self.fetch_text(url).await {
                Ok(text) => {
                    let picked = select_snippets(&text);
                    if !picked.is_empty() {
                        snippets.extend(picked);
                        source_urls.push(url.to_string());
                    }
                }
                Err(e) => tracing::debug!(%url, error = %e, "company page fetch failed"),
            }
        }

        if snippets.len() < MAX_SNIPPETS_PER_CANDIDATE {
            if let Some((wiki_url, text)) = self.fetch_wikipedia(company_name).await {
                let picked = select_snippets(&text);
                if !picked.is_empty() {
                    snippets.extend(picked);
                    snippets.truncate(MAX_SNIPPETS_PER_CANDIDATE);
                    source_urls.push(wiki_url);
                }
            }
        }

        if snippets.is_empty() {
            // extraction can still decline the candidate on this alone
            snippets.push(format!("{company_name} (no public description retrieved)"));
        }

        Ok(CandidateSnippets {
            snippets,
            source_urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wikipedia_url_underscores_and_escapes() {
        let base = "https://en.wikipedia.org";
        assert_eq!(
            wikipedia_url(base, "EPAM Systems"),
            "https://en.wikipedia.org/wiki/EPAM_Systems"
        );
        assert_eq!(
            wikipedia_url(base, "AT&T"),
            "https://en.wikipedia.org/wiki/AT%26T"
        );
    }

    #[test]
    fn corporate_suffixes_are_stripped_for_retry() {
        assert_eq!(strip_suffix_title("Acme Corp").as_deref(), Some("Acme"));
        assert_eq!(
            strip_suffix_title("Acme, Inc.").as_deref(),
            Some("Acme")
        );
        assert_eq!(strip_suffix_title("Acme").as_deref(), None);
    }

    #[test]
    fn snippet_selection_keeps_signal_paragraphs_in_order() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            "Short nav line",
            "The company provides cloud consulting and data analytics services to large \
             enterprise customers across North America and Europe, generating most revenue there.",
            "Founded in 1999, it went public in 2012 and now offers managed services to clients \
             in regulated industries, with delivery centers on three continents worldwide today.",
        );
        let picked = select_snippets(&text);
        assert_eq!(picked.len(), 2);
        assert!(picked[0].contains("cloud consulting"));
        assert!(picked[1].contains("managed services"));
    }

    async fn stub_wiki(status: u16, body: &'static str) -> String {
        use axum::{http::StatusCode, routing::get, Router};
        let app = Router::new().route(
            "/wiki/:title",
            get(move || async move {
                (
                    StatusCode::from_u16(status).unwrap(),
                    [(axum::http::header::CONTENT_TYPE, "text/html")],
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
    async fn wikipedia_snippets_are_selected_and_attributed() {
        let base = stub_wiki(
            200,
            "<html><body><p>Acme Corp is a company that provides cloud consulting and data \
             analytics services to large enterprise customers in North America and Europe.</p>\
             </body></html>",
        )
        .await;
        let fetcher = WebSnippetFetcher::with_wiki_base(reqwest::Client::new(), &base);
        let out = fetcher.fetch("Acme Corp", None).await.unwrap();
        assert_eq!(out.snippets.len(), 1);
        assert!(out.snippets[0].contains("cloud consulting"));
        assert_eq!(out.source_urls, vec![format!("{base}/wiki/Acme_Corp")]);
    }

    #[tokio::test]
    async fn unreachable_candidate_still_yields_a_synthetic_snippet() {
        let base = stub_wiki(404, "not found").await;
        let fetcher = WebSnippetFetcher::with_wiki_base(reqwest::Client::new(), &base);
        let out = fetcher.fetch("Nonexistent Co", None).await.unwrap();
        assert_eq!(out.snippets.len(), 1);
        assert!(out.snippets[0].contains("Nonexistent Co"));
        assert!(out.source_urls.is_empty());
    }
}
