//! Client for the text-analysis API.

mod cached_client;
mod client;
mod sanitize;
mod types;

pub use cached_client::CachedAnalyzerClient;
pub use client::AnalyzerClient;
