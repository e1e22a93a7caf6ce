//! Cached analyzer client that wraps AnalyzerClient with transparent caching.

use color_eyre::Result;
use serde_json::Value;
use tracing::info;

use crate::cache::{CacheResult, ResponseCache};
use crate::prefs::{AnalysisKind, NewAnalysis, RecentAnalyses};
use crate::store::StorageBackend;

use super::client::{translated_text, AnalyzerClient};
use super::sanitize::{sanitize_text_input, validate_text};
use super::types::{AnalyzeRequest, Endpoint, TranslateRequest};

/// Analyzer client with transparent caching support.
///
/// Same API as AnalyzerClient, but text is sanitized and validated first,
/// responses are served from the cache while valid, and each completed
/// request is recorded in the recent-analysis history. Text that is blank,
/// shorter than 2 or longer than 5000 characters never reaches the network.
pub struct CachedAnalyzerClient<B: ?Sized> {
  inner: AnalyzerClient,
  cache: ResponseCache<B>,
  history: RecentAnalyses<B>,
}

impl<B: StorageBackend + ?Sized> CachedAnalyzerClient<B> {
  pub fn new(inner: AnalyzerClient, cache: ResponseCache<B>, history: RecentAnalyses<B>) -> Self {
    Self {
      inner,
      cache,
      history,
    }
  }

  /// Analyze text with caching.
  pub async fn analyze(&self, text: &str, compact_mode: bool) -> Result<CacheResult<Value>> {
    let text = sanitize_text_input(text);
    validate_text(&text)?;
    let request = AnalyzeRequest { text, compact_mode };
    let key = ResponseCache::<B>::generate_key(Endpoint::Analyze.path(), &request.parameters());

    let result = self
      .cache
      .fetch(&key, || self.inner.analyze(&request))
      .await?;

    if result.is_cached() {
      info!(endpoint = Endpoint::Analyze.path(), "cache_hit");
    }
    self
      .history
      .add(&summarize(AnalysisKind::Analyze, &request.text, &result.data));

    Ok(result)
  }

  /// Translate text with caching.
  pub async fn translate(
    &self,
    text: &str,
    source_lang: &str,
    target_lang: &str,
  ) -> Result<CacheResult<Value>> {
    let text = sanitize_text_input(text);
    validate_text(&text)?;
    let request = TranslateRequest {
      text,
      source_lang: source_lang.to_string(),
      target_lang: target_lang.to_string(),
    };
    let key = ResponseCache::<B>::generate_key(Endpoint::Translate.path(), &request.parameters());

    let result = self
      .cache
      .fetch(&key, || self.inner.translate(&request))
      .await?;

    if result.is_cached() {
      info!(endpoint = Endpoint::Translate.path(), "cache_hit");
    }
    self
      .history
      .add(&summarize(AnalysisKind::Translate, &request.text, &result.data));

    Ok(result)
  }

  /// Backend status (not cached - it is a live health check).
  pub async fn status(&self) -> Result<Value> {
    self.inner.status().await
  }
}

/// History record for a response.
fn summarize(kind: AnalysisKind, text: &str, data: &Value) -> NewAnalysis {
  let language = match data.get("language") {
    Some(Value::String(code)) => Some(code.clone()),
    Some(lang) => lang.get("code").and_then(Value::as_str).map(String::from),
    None => None,
  };

  NewAnalysis {
    kind,
    text: text.to_string(),
    sentiment: data
      .pointer("/sentiment/label")
      .and_then(Value::as_str)
      .map(String::from),
    language,
    translation: translated_text(data).map(String::from),
  }
}
