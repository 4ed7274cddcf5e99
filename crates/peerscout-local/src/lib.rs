//! Local implementations for the peerscout pipeline: deterministic scoring
//! and admission, the call governor, the OpenAI-compatible model services,
//! curated discovery, web snippet fetching, ticker mining, and output sinks.

pub mod admission;
pub mod discover;
pub mod fetch;
pub mod governor;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod similarity;
pub mod tickers;

pub use fetch::shared_http_client;
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};
