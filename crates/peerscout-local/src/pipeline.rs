//! Pipeline orchestrator: normalize the target, discover candidates, then
//! score and admit each one. Model calls all go through the call governor;
//! non-model steps are best-effort and never sink a candidate on their own.

use crate::admission::{self, DEFAULT_MIN_SCORE};
use crate::governor::{CallGovernor, Clock, TokioClock};
use crate::similarity;
use crate::tickers;
use peerscout_core::{
    CandidateSnippets, ComparableRecord, DiscoveryProvider, Error, FieldExtractor,
    PlausibilityCheck, PlausibilityJudge, Result, SnippetFetcher, TargetInput, TargetNormalizer,
    TargetProfile,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub max_candidates: usize,
    pub min_score: f64,
    pub max_final: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_candidates: 40,
            min_score: DEFAULT_MIN_SCORE,
            max_final: 10,
        }
    }
}

/// What a run produced, including how it ended. A partial table is still a
/// valid outcome; the flags let the caller explain why it is partial.
#[derive(Debug)]
pub struct PipelineReport {
    pub comparables: Vec<ComparableRecord>,
    pub quota_exhausted: bool,
    pub interrupted: bool,
    /// Discovered candidates that were skipped after extraction failed.
    pub skipped: usize,
}

pub struct Pipeline<C: Clock = TokioClock> {
    normalizer: Arc<dyn TargetNormalizer>,
    discovery: Arc<dyn DiscoveryProvider>,
    fetcher: Arc<dyn SnippetFetcher>,
    extractor: Arc<dyn FieldExtractor>,
    judge: Arc<dyn PlausibilityJudge>,
    governor: CallGovernor<C>,
    cancel: Arc<AtomicBool>,
    config: PipelineConfig,
}

impl<C: Clock> Pipeline<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        normalizer: Arc<dyn TargetNormalizer>,
        discovery: Arc<dyn DiscoveryProvider>,
        fetcher: Arc<dyn SnippetFetcher>,
        extractor: Arc<dyn FieldExtractor>,
        judge: Arc<dyn PlausibilityJudge>,
        governor: CallGovernor<C>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            normalizer,
            discovery,
            fetcher,
            extractor,
            judge,
            governor,
            cancel: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Shared flag a signal handler can set to stop after the current
    /// candidate and keep whatever was accepted so far.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    async fn normalize_target(&self, target: &TargetInput) -> Result<TargetProfile> {
        let normalizer = self.normalizer.clone();
        match self
            .governor
            .call("normalize", || {
                let normalizer = normalizer.clone();
                async move { normalizer.normalize(target).await }
            })
            .await
        {
            Ok(profile) => Ok(profile),
            Err(e @ (Error::QuotaExhausted(_) | Error::NotConfigured(_))) => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "normalization failed, using degraded profile");
                Ok(TargetProfile::degraded(target))
            }
        }
    }

    pub async fn run(&self, target: &TargetInput) -> Result<PipelineReport> {
        if target.name.trim().is_empty() || target.business_description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "target name and business description are required".to_string(),
            ));
        }

        let profile = self.normalize_target(target).await?;
        tracing::info!(
            products = profile.products_services.len(),
            segments = profile.customer_segments.len(),
            "target profile ready"
        );

        let queries = crate::discover::build_search_queries(&profile);
        let leads = self
            .discovery
            .discover(&queries, self.config.max_candidates)
            .await?;
        tracing::info!(
            provider = self.discovery.name(),
            leads = leads.len(),
            "discovery complete"
        );

        let mut report = PipelineReport {
            comparables: Vec::new(),
            quota_exhausted: false,
            interrupted: false,
            skipped: 0,
        };

        for lead in leads {
            if self.cancelled() {
                tracing::warn!("interrupted, keeping partial results");
                report.interrupted = true;
                break;
            }
            // target itself sometimes shows up in its own discovery results
            if lead.name.to_lowercase() == target.name.to_lowercase() {
                continue;
            }

            let snippets = match self.fetcher.fetch(&lead.name, lead.url.as_deref()).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(candidate = %lead.name, error = %e, "fetch failed");
                    CandidateSnippets::default()
                }
            };
            let (mined_exchange, mined_ticker) = tickers::resolve_exchange_ticker(&snippets);

            let extractor = self.extractor.clone();
            let lead_name = lead.name.clone();
            let mut fields = match self
                .governor
                .call("extract", || {
                    let extractor = extractor.clone();
                    let name = lead_name.clone();
                    let snippets = snippets.clone();
                    async move { extractor.extract(&name, &snippets).await }
                })
                .await
            {
                Ok(f) => f,
                Err(Error::QuotaExhausted(msg)) => {
                    tracing::warn!(%msg, "quota exhausted, keeping partial results");
                    report.quota_exhausted = true;
                    break;
                }
                Err(e) => {
                    tracing::debug!(candidate = %lead.name, error = %e, "extraction failed, skipping");
                    report.skipped += 1;
                    continue;
                }
            };
            // an interrupt during the governed call aborts this candidate too
            if self.cancelled() {
                tracing::warn!(candidate = %lead.name, "interrupted, dropping in-flight candidate");
                report.interrupted = true;
                break;
            }
            if fields.exchange.is_none() {
                fields.exchange = mined_exchange;
            }
            if fields.ticker.is_none() {
                fields.ticker = mined_ticker;
            }
            if fields.url.is_none() {
                fields.url = lead.url.clone();
            }

            let scores = similarity::score_candidate(&profile, &fields);

            let judge = self.judge.clone();
            let check = match self
                .governor
                .call("judge", {
                    let fields = fields.clone();
                    let products = profile.products_services.clone();
                    let segments = profile.customer_segments.clone();
                    move || {
                        let judge = judge.clone();
                        let fields = fields.clone();
                        let products = products.clone();
                        let segments = segments.clone();
                        async move { judge.judge(&products, &segments, &fields).await }
                    }
                })
                .await
            {
                Ok(c) => c,
                Err(Error::QuotaExhausted(msg)) => {
                    tracing::warn!(%msg, "quota exhausted, keeping partial results");
                    report.quota_exhausted = true;
                    break;
                }
                Err(e) => {
                    tracing::debug!(candidate = %lead.name, error = %e, "plausibility check failed");
                    PlausibilityCheck::failsafe()
                }
            };
            if self.cancelled() {
                tracing::warn!(candidate = %lead.name, "interrupted, dropping in-flight candidate");
                report.interrupted = true;
                break;
            }

            let signals =
                admission::evaluate_signals(&profile, &fields, scores.validation, &check);
            let verdict = admission::admit(signals, self.config.min_score);
            if !verdict.accepted {
                tracing::debug!(
                    candidate = %fields.name,
                    score = scores.validation,
                    signals = ?verdict.signals,
                    "candidate rejected"
                );
                continue;
            }
            tracing::info!(
                candidate = %fields.name,
                score = scores.validation,
                tier = ?verdict.tier,
                listed = signals.public_listing,
                "candidate accepted"
            );

            report.comparables.push(ComparableRecord {
                name: fields.name,
                url: fields.url,
                exchange: fields.exchange,
                ticker: fields.ticker,
                business_activity: fields.business_activity,
                customer_segment: fields.customer_segment,
                sic_industry: fields.sic_industry,
                validation_score: scores.validation,
                service_similarity: scores.service,
                segment_similarity: scores.segment,
                is_plausible: check.is_plausible,
                evidence_urls: fields.evidence_urls,
            });
        }

        rank(&mut report.comparables);
        report.comparables.truncate(self.config.max_final);
        if report.comparables.len() < 3 {
            tracing::warn!(
                found = report.comparables.len(),
                "fewer than 3 comparables found, results may be weak"
            );
        }
        Ok(report)
    }
}

/// Rank best-first: validation score, then evidence depth, then how complete
/// the public-company identification is.
fn rank(records: &mut [ComparableRecord]) {
    records.sort_by(|a, b| {
        b.validation_score
            .partial_cmp(&a.validation_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.evidence_urls.len().cmp(&a.evidence_urls.len()))
            .then_with(|| b.sic_industry.is_some().cmp(&a.sic_industry.is_some()))
            .then_with(|| b.has_public_listing().cmp(&a.has_public_listing()))
    });
}
