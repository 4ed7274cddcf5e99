//! Text-similarity engine: term extraction, Jaccard overlap, TF-IDF cosine,
//! and the blended scores the admission policy consumes.
//!
//! All of this is deterministic and offline. The blend weights (0.6 set
//! overlap, 0.4 weighted-term overlap) and the 60/40 service/segment split
//! are policy, not tuning knobs.

use peerscout_core::{CandidateFields, TargetProfile};
use std::collections::{BTreeMap, BTreeSet};

/// Similarity scores for one candidate. All values in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityBreakdown {
    pub service: f64,
    pub segment: f64,
    pub validation: f64,
}

/// Lowercase, strip punctuation except hyphens (and `_`, which survives a
/// word-character class), split on whitespace.
fn normalize_words(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().map(|w| w.to_string()).collect()
}

/// Extract the normalized term set for a text: unigrams longer than 3 chars,
/// plus every consecutive bigram and trigram (short words are filtered only
/// as unigrams, never inside multi-word terms).
pub fn extract_terms(text: &str) -> BTreeSet<String> {
    let words = normalize_words(text);
    let mut terms = BTreeSet::new();
    for w in &words {
        if w.chars().count() > 3 {
            terms.insert(w.clone());
        }
    }
    for pair in words.windows(2) {
        terms.insert(pair.join(" "));
    }
    for triple in words.windows(3) {
        terms.insert(triple.join(" "));
    }
    terms
}

/// Intersection over union. 0.0 when either set is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f64;
    let uni = a.union(b).count() as f64;
    if uni == 0.0 {
        0.0
    } else {
        inter / uni
    }
}

/// TF-IDF cosine similarity between two texts.
///
/// Term frequencies are counted over the raw lowercase whitespace split (so
/// multi-word terms almost always carry zero frequency and the cosine is
/// driven by distinctive unigrams). IDF runs over the union of extracted
/// terms with a corpus of `corpus.len() + 2` documents and a +1 smoothing
/// denominator.
pub fn tfidf_cosine(a: &str, b: &str, corpus: &[&str]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let terms_a = extract_terms(a);
    let terms_b = extract_terms(b);
    if terms_a.is_empty() || terms_b.is_empty() {
        return 0.0;
    }

    let tf = |text: &str| -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for tok in text.to_lowercase().split_whitespace() {
            *out.entry(tok.to_string()).or_insert(0.0) += 1.0;
        }
        out
    };
    let tf_a = tf(a);
    let tf_b = tf(b);

    let n = (corpus.len() + 2) as f64;
    let lowered: Vec<String> = corpus.iter().map(|d| d.to_lowercase()).collect();

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for term in terms_a.union(&terms_b) {
        let doc_count = lowered.iter().filter(|d| d.contains(term.as_str())).count();
        let idf = if doc_count > 0 {
            (n / (doc_count as f64 + 1.0)).ln()
        } else {
            0.0
        };
        let wa = tf_a.get(term).copied().unwrap_or(0.0) * idf;
        let wb = tf_b.get(term).copied().unwrap_or(0.0) * idf;
        dot += wa * wb;
        norm_a += wa * wa;
        norm_b += wb * wb;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Blend of Jaccard term overlap and TF-IDF cosine, clamped to [0, 1].
/// The corpus for the IDF side is just the two texts themselves.
pub fn blended_similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let j = jaccard(&extract_terms(a), &extract_terms(b));
    let t = tfidf_cosine(a, b, &[a, b]);
    (0.6 * j + 0.4 * t).clamp(0.0, 1.0)
}

/// Score one candidate against the target: service similarity over the
/// product bullets vs. the business activity, segment similarity over the
/// segment bullets vs. the customer segment, 60/40 validation blend.
pub fn score_candidate(profile: &TargetProfile, fields: &CandidateFields) -> SimilarityBreakdown {
    let target_products = profile.products_services.join(" ");
    let target_segments = profile.customer_segments.join(" ");
    let service = blended_similarity(&target_products, &fields.business_activity);
    let segment = blended_similarity(&target_segments, &fields.customer_segment);
    SimilarityBreakdown {
        service,
        segment,
        validation: 0.6 * service + 0.4 * segment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extract_terms_empty_input_is_empty() {
        assert!(extract_terms("").is_empty());
        assert!(extract_terms("   \t\n ").is_empty());
    }

    #[test]
    fn extract_terms_single_short_word_is_empty() {
        // "word" has exactly 4 chars, so it survives; a 3-char word does not,
        // and a lone word can never form a bigram or trigram.
        assert!(extract_terms("the").is_empty());
        assert_eq!(
            extract_terms("word"),
            BTreeSet::from(["word".to_string()])
        );
    }

    #[test]
    fn extract_terms_emits_unigrams_bigrams_trigrams() {
        let t = extract_terms("Enterprise resource planning");
        assert!(t.contains("enterprise"));
        assert!(t.contains("resource"));
        assert!(t.contains("planning"));
        assert!(t.contains("enterprise resource"));
        assert!(t.contains("resource planning"));
        assert!(t.contains("enterprise resource planning"));
        assert_eq!(t.len(), 6);
    }

    #[test]
    fn extract_terms_keeps_short_words_in_phrases() {
        let t = extract_terms("software as a service");
        assert!(!t.contains("as"));
        assert!(!t.contains("a"));
        assert!(t.contains("software as"));
        assert!(t.contains("as a service"));
    }

    #[test]
    fn extract_terms_strips_punctuation_but_keeps_hyphens() {
        let t = extract_terms("cloud-native apps, APIs!");
        assert!(t.contains("cloud-native"));
        assert!(t.contains("apps"));
        assert!(t.contains("apis"));
        assert!(!t.iter().any(|s| s.contains(',') || s.contains('!')));
    }

    #[test]
    fn jaccard_empty_sets_score_zero() {
        let empty = BTreeSet::new();
        let some = BTreeSet::from(["a".to_string()]);
        assert_eq!(jaccard(&empty, &empty), 0.0);
        assert_eq!(jaccard(&empty, &some), 0.0);
        assert_eq!(jaccard(&some, &empty), 0.0);
    }

    #[test]
    fn jaccard_partial_overlap() {
        let a = BTreeSet::from(["a".to_string(), "b".to_string()]);
        let b = BTreeSet::from(["b".to_string(), "c".to_string()]);
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn identical_nonempty_texts_blend_to_one() {
        let text = "cloud consulting and data analytics services";
        let s = blended_similarity(text, text);
        assert!((s - 1.0).abs() < 1e-9, "expected 1.0, got {s}");
    }

    #[test]
    fn empty_side_scores_zero_without_panicking() {
        assert_eq!(blended_similarity("", "cloud consulting"), 0.0);
        assert_eq!(blended_similarity("cloud consulting", ""), 0.0);
        assert_eq!(tfidf_cosine("", "x", &[]), 0.0);
    }

    #[test]
    fn disjoint_texts_score_zero() {
        let s = blended_similarity("maritime shipping logistics", "quantum encryption research");
        assert_eq!(s, 0.0);
    }

    #[test]
    fn validation_score_is_sixty_forty_blend() {
        let profile = TargetProfile {
            products_services: vec!["cloud consulting".to_string()],
            customer_segments: vec!["healthcare providers".to_string()],
            sic_names: vec![],
            keywords: vec![],
        };
        let fields = CandidateFields {
            name: "Acme".to_string(),
            url: None,
            exchange: None,
            ticker: None,
            business_activity: "cloud consulting".to_string(),
            customer_segment: "healthcare providers".to_string(),
            sic_industry: None,
            evidence_urls: vec![],
        };
        let b = score_candidate(&profile, &fields);
        assert!((b.validation - (0.6 * b.service + 0.4 * b.segment)).abs() < 1e-12);
        assert!((b.validation - 1.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn jaccard_is_symmetric_for_arbitrary_text(a in ".{0,80}", b in ".{0,80}") {
            let (ta, tb) = (extract_terms(&a), extract_terms(&b));
            prop_assert_eq!(jaccard(&ta, &tb), jaccard(&tb, &ta));
        }

        #[test]
        fn blended_score_stays_in_unit_range(a in ".{0,80}", b in ".{0,80}") {
            let s = blended_similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s), "score out of range: {}", s);
        }

        #[test]
        fn term_sets_never_contain_the_empty_string(a in ".{0,120}") {
            prop_assert!(!extract_terms(&a).contains(""));
        }
    }
}
