//! Bounded list of recent analyses, newest first.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{Clock, SystemClock};
use crate::store::{PersistentStore, StorageBackend, StorageKey};

const MAX_RECENT_ANALYSES: usize = 10;
const TEXT_PREVIEW_CHARS: usize = 100;
const TRANSLATION_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
  Analyze,
  Translate,
}

/// What a caller knows about a finished analysis.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
  pub kind: AnalysisKind,
  pub text: String,
  pub sentiment: Option<String>,
  pub language: Option<String>,
  pub translation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sentiment: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub language: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub translation: Option<String>,
}

/// Stored history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentAnalysis {
  /// Epoch milliseconds of the insert
  pub id: i64,
  /// Leading characters of the analyzed text
  pub text: String,
  #[serde(rename = "type")]
  pub kind: AnalysisKind,
  pub timestamp: String,
  pub preview: Preview,
}

fn truncate_chars(s: &str, max: usize) -> String {
  s.chars().take(max).collect()
}

pub struct RecentAnalyses<B: ?Sized, C = SystemClock> {
  store: PersistentStore<B>,
  clock: C,
}

impl<B: StorageBackend + ?Sized> RecentAnalyses<B, SystemClock> {
  pub fn new(store: PersistentStore<B>) -> Self {
    Self {
      store,
      clock: SystemClock,
    }
  }
}

impl<B: StorageBackend + ?Sized, C: Clock> RecentAnalyses<B, C> {
  #[cfg(test)]
  pub fn with_clock<C2: Clock>(self, clock: C2) -> RecentAnalyses<B, C2> {
    RecentAnalyses {
      store: self.store,
      clock,
    }
  }

  pub fn list(&self) -> Vec<RecentAnalysis> {
    self
      .store
      .get(StorageKey::RecentAnalyses.as_str(), Vec::new())
  }

  /// Prepend a record, keeping at most the ten newest.
  pub fn add(&self, analysis: &NewAnalysis) -> bool {
    let now = self.clock.now_millis();
    let timestamp = DateTime::<Utc>::from_timestamp_millis(now)
      .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
      .unwrap_or_default();

    let record = RecentAnalysis {
      id: now,
      text: truncate_chars(&analysis.text, TEXT_PREVIEW_CHARS),
      kind: analysis.kind,
      timestamp,
      preview: Preview {
        sentiment: analysis.sentiment.clone(),
        language: analysis.language.clone(),
        translation: analysis
          .translation
          .as_deref()
          .map(|t| truncate_chars(t, TRANSLATION_PREVIEW_CHARS)),
      },
    };

    let mut recent = self.list();
    recent.insert(0, record);
    recent.truncate(MAX_RECENT_ANALYSES);
    self.store.set(StorageKey::RecentAnalyses.as_str(), &recent)
  }

  pub fn remove(&self, id: i64) -> bool {
    let mut recent = self.list();
    recent.retain(|item| item.id != id);
    self.store.set(StorageKey::RecentAnalyses.as_str(), &recent)
  }

  pub fn clear(&self) -> bool {
    self
      .store
      .set(StorageKey::RecentAnalyses.as_str(), &Vec::<RecentAnalysis>::new())
  }
}
