//! Tiered admission policy: combines the validation score, three
//! deterministic overlap checks, and the external plausibility verdict into
//! a single accept/reject decision.

use crate::similarity::extract_terms;
use peerscout_core::{CandidateFields, PlausibilityCheck, TargetProfile};
use serde::Serialize;
use std::collections::BTreeSet;

/// A score this strong admits unconditionally, even over a negative
/// plausibility verdict. Fixed policy, not a tuning knob.
pub const STRONG_ACCEPT_FLOOR: f64 = 0.70;
/// A score this strong admits when the plausibility verdict agrees.
pub const PLAUSIBLE_ACCEPT_FLOOR: f64 = 0.50;
/// Default tier-3 threshold; this one is caller-configurable.
pub const DEFAULT_MIN_SCORE: f64 = 0.35;

const MIN_PRODUCT_OVERLAPS: usize = 2;
const MIN_SEGMENT_OVERLAPS: usize = 1;

const UNRELATED_KEYWORDS: [&str; 5] = [
    "manufacturing",
    "hardware vendor",
    "pure manufacturer",
    "equipment supplier",
    "physical product",
];

const SERVICE_KEYWORDS: [&str; 5] = [
    "consulting",
    "services",
    "advisory",
    "managed services",
    "software",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionTier {
    /// Tier 1: validation score alone was decisive.
    StrongScore,
    /// Tier 2: good score confirmed by the plausibility verdict.
    ScoreWithPlausibility,
    /// Tier 3: configured threshold plus all deterministic checks plus the
    /// plausibility verdict.
    ChecksAndPlausibility,
}

/// Everything that fed the decision, retained for observability.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AdmissionSignals {
    pub validation_score: f64,
    pub product_overlap: bool,
    pub segment_overlap: bool,
    pub not_unrelated: bool,
    /// Advisory only; logged, never gating.
    pub public_listing: bool,
    pub plausible: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AdmissionVerdict {
    pub accepted: bool,
    pub tier: Option<AdmissionTier>,
    pub signals: AdmissionSignals,
}

/// Bigrams and trigrams of each bullet, on the raw lowercase whitespace
/// split. Unigrams are deliberately excluded here: overlap on a single
/// generic word is not evidence of a shared offering.
fn bullet_phrases(bullets: &[String]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for bullet in bullets {
        let lowered = bullet.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        for pair in words.windows(2) {
            out.insert(pair.join(" "));
        }
        for triple in words.windows(3) {
            out.insert(triple.join(" "));
        }
    }
    out
}

/// At least two shared bigram/trigram phrases between the target's product
/// bullets and the candidate's business-activity terms.
pub fn product_overlap(profile: &TargetProfile, fields: &CandidateFields) -> bool {
    let target = bullet_phrases(&profile.products_services);
    let candidate = extract_terms(&fields.business_activity);
    target.intersection(&candidate).count() >= MIN_PRODUCT_OVERLAPS
}

/// At least one shared phrase between the target's segment bullets and the
/// candidate's customer-segment terms.
pub fn segment_overlap(profile: &TargetProfile, fields: &CandidateFields) -> bool {
    let target = bullet_phrases(&profile.customer_segments);
    let candidate = extract_terms(&fields.customer_segment);
    target.intersection(&candidate).count() >= MIN_SEGMENT_OVERLAPS
}

/// Negative filter. A candidate fails only when it matches at least two
/// unrelated keywords AND shares no consulting/services keyword with the
/// target's product text. A shared keyword must appear on both sides.
pub fn not_unrelated(profile: &TargetProfile, fields: &CandidateFields) -> bool {
    let candidate_text = format!("{} {}", fields.business_activity, fields.customer_segment)
        .to_lowercase();
    let unrelated_hits = UNRELATED_KEYWORDS
        .iter()
        .filter(|kw| candidate_text.contains(*kw))
        .count();
    if unrelated_hits < 2 {
        return true;
    }
    let target_text = profile.products_services.join(" ").to_lowercase();
    SERVICE_KEYWORDS
        .iter()
        .any(|kw| candidate_text.contains(kw) && target_text.contains(kw))
}

/// Exchange and ticker both present.
pub fn public_listing(fields: &CandidateFields) -> bool {
    fields.exchange.as_deref().is_some_and(|s| !s.is_empty())
        && fields.ticker.as_deref().is_some_and(|s| !s.is_empty())
}

/// Gather every admission signal for one candidate.
pub fn evaluate_signals(
    profile: &TargetProfile,
    fields: &CandidateFields,
    validation_score: f64,
    check: &PlausibilityCheck,
) -> AdmissionSignals {
    AdmissionSignals {
        validation_score,
        product_overlap: product_overlap(profile, fields),
        segment_overlap: segment_overlap(profile, fields),
        not_unrelated: not_unrelated(profile, fields),
        public_listing: public_listing(fields),
        plausible: check.is_plausible,
    }
}

/// The tiered decision. Evaluated top-down, first match wins.
pub fn admit(signals: AdmissionSignals, min_score: f64) -> AdmissionVerdict {
    let tier = if signals.validation_score >= STRONG_ACCEPT_FLOOR {
        Some(AdmissionTier::StrongScore)
    } else if signals.validation_score >= PLAUSIBLE_ACCEPT_FLOOR && signals.plausible {
        Some(AdmissionTier::ScoreWithPlausibility)
    } else if signals.validation_score >= min_score
        && signals.product_overlap
        && signals.segment_overlap
        && signals.not_unrelated
        && signals.plausible
    {
        Some(AdmissionTier::ChecksAndPlausibility)
    } else {
        None
    };
    AdmissionVerdict {
        accepted: tier.is_some(),
        tier,
        signals,
    }
}
