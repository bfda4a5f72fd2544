use serde_json::json;

use crate::error::Result;
use super::{bearer, join_url, ChatAdapter, ProviderRequest, MAX_TOKENS};

/// `/chat/completions` with bearer auth. Also serves DeepSeek, Grok, Mistral,
/// Llama (Together) and Copilot, which speak the same dialect.
#[derive(Debug, Clone, Copy)]
pub struct OpenAiCompatible;

impl ChatAdapter for OpenAiCompatible {
    fn build_request(
        &self,
        base_url: &str,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> Result<ProviderRequest> {
        Ok(ProviderRequest {
            url: join_url(base_url, "/chat/completions"),
            headers: vec![bearer(api_key)],
            body: json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": MAX_TOKENS,
            }),
        })
    }

    fn reply_pointer(&self) -> &'static str {
        "/choices/0/message/content"
    }
}
