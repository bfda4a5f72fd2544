use serde_json::json;

use crate::error::Result;
use super::{bearer, join_url, ChatAdapter, ProviderRequest, MAX_TOKENS};

/// DashScope text-generation endpoint.
#[derive(Debug, Clone, Copy)]
pub struct QwenAdapter;

impl ChatAdapter for QwenAdapter {
    fn build_request(
        &self,
        base_url: &str,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> Result<ProviderRequest> {
        Ok(ProviderRequest {
            url: join_url(base_url, "/services/aigc/text-generation/generation"),
            headers: vec![bearer(api_key)],
            body: json!({
                "model": model,
                "input": { "prompt": prompt },
                "parameters": { "max_tokens": MAX_TOKENS },
            }),
        })
    }

    fn reply_pointer(&self) -> &'static str {
        "/output/text"
    }
}
