use reqwest::Url;
use serde_json::json;

use super::{join_url, ChatAdapter, ProviderRequest};
use crate::error::{AiraError, Result};

/// Gemini `generateContent`. The key travels as the `key` query parameter,
/// so the built URL is a secret and must not be logged.
#[derive(Debug, Clone, Copy)]
pub struct GeminiAdapter;

impl ChatAdapter for GeminiAdapter {
    fn build_request(
        &self,
        base_url: &str,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> Result<ProviderRequest> {
        // ParseError carries no input, so the key cannot leak through it.
        let mut url = Url::parse(&join_url(base_url, "/models"))
            .map_err(|e| AiraError::Internal(format!("invalid Gemini base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AiraError::Internal("Gemini base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(&format!("{}:generateContent", model));
        url.query_pairs_mut().append_pair("key", api_key);

        Ok(ProviderRequest {
            url: url.to_string(),
            headers: Vec::new(),
            body: json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
            }),
        })
    }

    fn reply_pointer(&self) -> &'static str {
        "/candidates/0/content/parts/0/text"
    }
}
