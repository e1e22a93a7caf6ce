use crate::api::types::{AnalyzeRequest, ApiFailure, Endpoint, TranslateRequest};
use crate::config::ApiConfig;
use color_eyre::{eyre::eyre, Report, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Analysis API client wrapper
#[derive(Clone)]
pub struct AnalyzerClient {
  http: reqwest::Client,
  base_url: Url,
  status_timeout: Duration,
}

fn api_error(endpoint: Endpoint, failure: ApiFailure) -> Report {
  eyre!("{} [{}]", failure.message(endpoint), failure.error_type())
}

fn transport_failure(e: &reqwest::Error) -> ApiFailure {
  if e.is_timeout() {
    ApiFailure::Timeout
  } else {
    ApiFailure::Network
  }
}

impl AnalyzerClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    // Trailing slash so joined paths extend the base instead of replacing it
    let mut base = config.base_url.clone();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      status_timeout: Duration::from_secs(config.status_timeout_secs),
    })
  }

  fn url(&self, path: &str) -> Result<Url> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| eyre!("Invalid API path {}: {}", path, e))
  }

  async fn post<T: Serialize>(&self, endpoint: Endpoint, body: &T) -> Result<Value> {
    let url = self.url(endpoint.path())?;
    debug!(%url, "POST");

    let response = self
      .http
      .post(url)
      .json(body)
      .send()
      .await
      .map_err(|e| api_error(endpoint, transport_failure(&e)))?;

    let status = response.status();
    if !status.is_success() {
      let detail = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("detail").and_then(Value::as_str).map(String::from));
      return Err(api_error(
        endpoint,
        ApiFailure::Status {
          code: status.as_u16(),
          detail,
        },
      ));
    }

    let data: Value = response
      .json()
      .await
      .map_err(|e| eyre!("Invalid response from server: {}", e))?;

    if data.is_null() {
      return Err(eyre!("Invalid response from server"));
    }

    Ok(data)
  }

  /// Run sentiment/language/toxicity analysis
  pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<Value> {
    self.post(Endpoint::Analyze, request).await
  }

  /// Translate text. Fails if the response carries no translation.
  pub async fn translate(&self, request: &TranslateRequest) -> Result<Value> {
    let data = self.post(Endpoint::Translate, request).await?;
    if translated_text(&data).is_none() {
      return Err(eyre!("No translation received from server"));
    }
    Ok(data)
  }

  /// Backend health and model information (never cached)
  pub async fn status(&self) -> Result<Value> {
    let url = self.url("/status")?;

    let response = self
      .http
      .get(url)
      .timeout(self.status_timeout)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch backend status: {}", e))?
      .error_for_status()
      .map_err(|e| eyre!("Failed to fetch backend status: {}", e))?;

    response
      .json()
      .await
      .map_err(|e| eyre!("Invalid status response: {}", e))
  }
}

/// The translated text, under either field name the API uses.
pub fn translated_text(data: &Value) -> Option<&str> {
  data
    .get("translated_text")
    .or_else(|| data.get("translation"))
    .and_then(Value::as_str)
    .filter(|t| !t.is_empty())
}
