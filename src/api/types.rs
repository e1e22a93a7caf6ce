//! Request bodies and failure classification for the analysis API.

use serde::Serialize;
use serde_json::Value;

use crate::cache::Parameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
  Analyze,
  Translate,
}

impl Endpoint {
  pub fn path(self) -> &'static str {
    match self {
      Self::Analyze => "/analyze",
      Self::Translate => "/translate",
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
  pub text: String,
  pub compact_mode: bool,
}

impl AnalyzeRequest {
  /// Parameters used to derive the cache key.
  pub fn parameters(&self) -> Parameters {
    let mut params = Parameters::new();
    params.insert("text".into(), Value::from(self.text.as_str()));
    params.insert("compact_mode".into(), Value::from(self.compact_mode));
    params
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest {
  pub text: String,
  pub source_lang: String,
  pub target_lang: String,
}

impl TranslateRequest {
  pub fn parameters(&self) -> Parameters {
    let mut params = Parameters::new();
    params.insert("text".into(), Value::from(self.text.as_str()));
    params.insert("source_lang".into(), Value::from(self.source_lang.as_str()));
    params.insert("target_lang".into(), Value::from(self.target_lang.as_str()));
    params
  }
}

/// Why a request did not produce a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFailure {
  Timeout,
  /// No response at all (connection refused, DNS, TLS, ...)
  Network,
  Status { code: u16, detail: Option<String> },
}

impl ApiFailure {
  /// Stable label, e.g. `TIMEOUT` or `HTTP_422`.
  pub fn error_type(&self) -> String {
    match self {
      Self::Timeout => "TIMEOUT".to_string(),
      Self::Network => "NETWORK_ERROR".to_string(),
      Self::Status { code, .. } => format!("HTTP_{}", code),
    }
  }

  /// Message shown to the user.
  pub fn message(&self, endpoint: Endpoint) -> String {
    match self {
      Self::Timeout => "Request timeout. Please try again".to_string(),
      Self::Network => {
        "Network error. Please check your connection and ensure the API server is running"
          .to_string()
      }
      Self::Status { code: 422, .. } => match endpoint {
        Endpoint::Analyze => "Invalid input. Please check your text and try again".to_string(),
        Endpoint::Translate => "Invalid translation request. Please check your input".to_string(),
      },
      Self::Status { code: 500, .. } => "Server error. Please try again later".to_string(),
      Self::Status { detail: Some(detail), .. } => detail.clone(),
      Self::Status { code, detail: None } => match endpoint {
        Endpoint::Analyze => format!("An error occurred during analysis (HTTP {})", code),
        Endpoint::Translate => format!("An error occurred during translation (HTTP {})", code),
      },
    }
  }
}
