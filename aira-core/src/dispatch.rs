//! Dispatch router: model catalog lookup, model-identifier parsing, and the
//! single outbound call per prompt.
//!
//! A model identifier is what the UI uses to tell parallel chat panes apart:
//! `provider-model-parts-timestamp`, e.g. `openai-gpt-4o-1700000000`.

use std::collections::HashMap;

use reqwest::Client;
use serde_json::Value;

use crate::config::ProvidersConfig;
use crate::error::{AiraError, Result};
use crate::providers::Provider;

/// Models offered for `provider_name` (case-insensitive). Unknown providers
/// get an empty list.
pub fn list_models(provider_name: &str) -> Vec<String> {
    Provider::from_name(provider_name)
        .map(|p| p.models().iter().map(|m| m.to_string()).collect())
        .unwrap_or_default()
}

/// Split a model identifier into `(provider, model)`.
///
/// The provider is the first hyphen-separated segment and the trailing
/// timestamp segment is dropped. With fewer than three segments there is no
/// model part to isolate, so the identifier itself is returned as the model.
pub fn resolve_model_identifier(model_identifier: &str) -> (String, String) {
    let parts: Vec<&str> = model_identifier.split('-').collect();
    let provider = parts[0].to_string();

    if parts.len() < 3 {
        return (provider, model_identifier.to_string());
    }

    let model = parts[1..parts.len() - 1].join("-");
    (provider, model)
}

/// Issues provider calls through a shared, connection-pooled HTTP client.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    base_urls: HashMap<Provider, String>,
}

impl Dispatcher {
    pub fn new() -> Result<Self> {
        Self::from_config(&ProvidersConfig::default())
    }

    /// Build a dispatcher honouring `[providers.base_urls]` overrides.
    /// Unknown provider names in the map are ignored with a warning.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AiraError::Internal(format!("failed to build HTTP client: {}", e)))?;

        let mut base_urls = HashMap::new();
        for (name, url) in &config.base_urls {
            match Provider::from_name(name) {
                Some(p) => {
                    base_urls.insert(p, url.clone());
                }
                None => tracing::warn!(provider = %name, "Ignoring base URL for unknown provider"),
            }
        }

        Ok(Self { client, base_urls })
    }

    /// Point one provider at a different base URL (mock servers, gateways).
    pub fn with_base_url(mut self, provider: Provider, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, base_url.into());
        self
    }

    pub fn base_url(&self, provider: Provider) -> &str {
        self.base_urls
            .get(&provider)
            .map(String::as_str)
            .unwrap_or_else(|| provider.default_base_url())
    }

    /// Send `prompt` to `model` at the named provider and return the reply text.
    pub async fn invoke(
        &self,
        provider_name: &str,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> Result<String> {
        let provider: Provider = provider_name.parse()?;
        let adapter = provider.adapter();
        let request = adapter.build_request(self.base_url(provider), model, prompt, api_key)?;

        tracing::debug!(provider = %provider, model = %model, "Calling provider");

        let call_error = |detail: String| AiraError::ProviderCall {
            provider: provider.label().to_string(),
            detail,
        };

        let mut builder = self
            .client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| call_error(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| call_error(e.without_url().to_string()))?;

        if status != reqwest::StatusCode::OK {
            tracing::error!(provider = %provider, status = status.as_u16(), "Provider returned an error");
            return Err(call_error(body));
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| call_error(format!("malformed response: {}", e)))?;

        adapter.extract_reply(&json).ok_or_else(|| {
            call_error(format!(
                "malformed response: missing {}",
                adapter.reply_pointer()
            ))
        })
    }
}
