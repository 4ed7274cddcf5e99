//! Candidate discovery: deterministic query construction from the target
//! profile, and a curated catalog of public companies matched against those
//! queries. The catalog keeps the pipeline useful without a search backend;
//! any [`DiscoveryProvider`] can replace it.

use peerscout_core::{CandidateLead, DiscoveryProvider, Result, TargetProfile};
use std::collections::BTreeSet;

pub const MAX_QUERIES: usize = 15;

/// Build search queries from the profile, best-signal first:
/// product x segment pairs, then keyword queries, then "companies like"
/// variants. Capped at [`MAX_QUERIES`].
pub fn build_search_queries(profile: &TargetProfile) -> Vec<String> {
    let mut queries = Vec::new();
    for product in profile.products_services.iter().take(5) {
        for segment in profile.customer_segments.iter().take(3) {
            queries.push(format!("{product} {segment} public company"));
        }
    }
    for keyword in profile.keywords.iter().take(5) {
        queries.push(format!(
            "{keyword} consulting services public company stock"
        ));
    }
    for sic in profile.sic_names.iter().take(3) {
        queries.push(format!("companies like {sic}"));
    }
    queries.truncate(MAX_QUERIES);
    queries
}

struct CatalogEntry {
    name: &'static str,
    url: &'static str,
    /// Lowercase terms this entry matches on.
    tags: &'static [&'static str],
}

/// Well-known listed companies, biased toward IT and professional services.
/// Tags are matched as substrings against the lowercased queries.
const CATALOG: &[CatalogEntry] = &[
    CatalogEntry { name: "Accenture", url: "https://www.accenture.com", tags: &["consulting", "technology", "digital", "cloud", "outsourcing"] },
    CatalogEntry { name: "Cognizant", url: "https://www.cognizant.com", tags: &["consulting", "technology", "outsourcing", "digital"] },
    CatalogEntry { name: "Infosys", url: "https://www.infosys.com", tags: &["consulting", "technology", "outsourcing", "software"] },
    CatalogEntry { name: "Wipro", url: "https://www.wipro.com", tags: &["consulting", "technology", "outsourcing"] },
    CatalogEntry { name: "Capgemini", url: "https://www.capgemini.com", tags: &["consulting", "technology", "cloud", "digital"] },
    CatalogEntry { name: "EPAM Systems", url: "https://www.epam.com", tags: &["software", "engineering", "consulting", "digital"] },
    CatalogEntry { name: "Globant", url: "https://www.globant.com", tags: &["software", "digital", "consulting"] },
    CatalogEntry { name: "Thoughtworks", url: "https://www.thoughtworks.com", tags: &["software", "consulting", "agile", "digital"] },
    CatalogEntry { name: "Gartner", url: "https://www.gartner.com", tags: &["research", "advisory", "consulting"] },
    CatalogEntry { name: "Booz Allen Hamilton", url: "https://www.boozallen.com", tags: &["consulting", "government", "analytics", "cyber"] },
    CatalogEntry { name: "ICF International", url: "https://www.icf.com", tags: &["consulting", "government", "policy"] },
    CatalogEntry { name: "CGI", url: "https://www.cgi.com", tags: &["consulting", "technology", "government", "outsourcing"] },
    CatalogEntry { name: "DXC Technology", url: "https://dxc.com", tags: &["technology", "outsourcing", "cloud", "services"] },
    CatalogEntry { name: "Leidos", url: "https://www.leidos.com", tags: &["government", "defense", "technology", "engineering"] },
    CatalogEntry { name: "Salesforce", url: "https://www.salesforce.com", tags: &["software", "crm", "cloud", "saas"] },
    CatalogEntry { name: "ServiceNow", url: "https://www.servicenow.com", tags: &["software", "workflow", "cloud", "saas"] },
    CatalogEntry { name: "Snowflake", url: "https://www.snowflake.com", tags: &["data", "analytics", "cloud", "warehouse"] },
    CatalogEntry { name: "Palantir Technologies", url: "https://www.palantir.com", tags: &["data", "analytics", "government", "software"] },
    CatalogEntry { name: "Verint Systems", url: "https://www.verint.com", tags: &["analytics", "software", "customer"] },
    CatalogEntry { name: "ExlService Holdings", url: "https://www.exlservice.com", tags: &["analytics", "outsourcing", "insurance", "data"] },
    // vertical extensions
    CatalogEntry { name: "Veeva Systems", url: "https://www.veeva.com", tags: &["healthcare", "pharma", "life sciences", "software"] },
    CatalogEntry { name: "HealthStream", url: "https://www.healthstream.com", tags: &["healthcare", "training", "software"] },
    CatalogEntry { name: "Premier Inc", url: "https://premierinc.com", tags: &["healthcare", "hospitals", "analytics"] },
    CatalogEntry { name: "Stride", url: "https://www.stridelearning.com", tags: &["education", "learning", "online"] },
    CatalogEntry { name: "Coursera", url: "https://www.coursera.org", tags: &["education", "learning", "online", "courses"] },
    CatalogEntry { name: "Grand Canyon Education", url: "https://www.gce.com", tags: &["education", "university", "services"] },
];

/// Generic fallback when no tag matches at all: broad-line consultancies.
const FALLBACK: &[&str] = &["Accenture", "Cognizant", "Infosys", "Capgemini", "CGI"];

#[derive(Debug, Default, Clone)]
pub struct CuratedDiscovery;

#[async_trait::async_trait]
impl DiscoveryProvider for CuratedDiscovery {
    fn name(&self) -> &'static str {
        "curated"
    }

    async fn discover(
        &self,
        queries: &[String],
        max_candidates: usize,
    ) -> Result<Vec<CandidateLead>> {
        let lowered: Vec<String> = queries.iter().map(|q| q.to_lowercase()).collect();
        let mut seen = BTreeSet::new();
        let mut leads = Vec::new();

        for entry in CATALOG {
            let hit = entry
                .tags
                .iter()
                .any(|tag| lowered.iter().any(|q| q.contains(tag)));
            if hit && seen.insert(entry.name.to_lowercase()) {
                leads.push(CandidateLead {
                    name: entry.name.to_string(),
                    url: Some(entry.url.to_string()),
                });
            }
            if leads.len() >= max_candidates {
                break;
            }
        }

        if leads.is_empty() {
            tracing::warn!("no catalog tag matched any query, using fallback list");
            for name in FALLBACK.iter().take(max_candidates) {
                leads.push(CandidateLead {
                    name: name.to_string(),
                    url: None,
                });
            }
        }

        Ok(leads)
    }
}
