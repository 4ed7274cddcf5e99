//! Exchange/ticker mining: regex scan of candidate snippets for listing
//! mentions like "NYSE: ACN" or "listed on the Nasdaq under EPAM".

use once_cell::sync::Lazy;
use peerscout_core::CandidateSnippets;
use regex::Regex;

/// "NYSE: ACN", "NASDAQ:EPAM", "AMEX: ABC", "OTC: XYZ". The exchange name is
/// case-insensitive; the ticker group stays case-sensitive so prose words
/// never pass for symbols.
static EXCHANGE_TICKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(NYSE|NASDAQ|AMEX|OTC)\b\s*:\s*((?-i:[A-Z]{1,5}))\b")
        .expect("static regex")
});

/// Prose form: "listed on the NASDAQ under the symbol EPAM".
static LISTED_UNDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blisted on (?:the )?(NYSE|NASDAQ|AMEX|OTC)\b.{0,40}?\b((?-i:[A-Z]{2,5}))\b")
        .expect("static regex")
});

fn mine_text(text: &str) -> Option<(String, String)> {
    EXCHANGE_TICKER_RE
        .captures(text)
        .or_else(|| LISTED_UNDER_RE.captures(text))
        .map(|c| (c[1].to_uppercase(), c[2].to_string()))
}

/// First listing mention across the snippets wins.
pub fn resolve_exchange_ticker(snippets: &CandidateSnippets) -> (Option<String>, Option<String>) {
    for text in &snippets.snippets {
        if let Some((exchange, ticker)) = mine_text(text) {
            return (Some(exchange), Some(ticker));
        }
    }
    (None, None)
}
