use serde_json::json;

use crate::error::Result;
use super::{join_url, ChatAdapter, ProviderRequest, MAX_TOKENS};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API. Authenticates with `x-api-key`.
#[derive(Debug, Clone, Copy)]
pub struct ClaudeAdapter;

impl ChatAdapter for ClaudeAdapter {
    fn build_request(
        &self,
        base_url: &str,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> Result<ProviderRequest> {
        Ok(ProviderRequest {
            url: join_url(base_url, "/messages"),
            headers: vec![
                ("x-api-key", api_key.to_string()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
            body: json!({
                "model": model,
                "max_tokens": MAX_TOKENS,
                "messages": [{ "role": "user", "content": prompt }],
            }),
        })
    }

    fn reply_pointer(&self) -> &'static str {
        "/content/0/text"
    }
}
