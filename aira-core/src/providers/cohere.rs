use serde_json::json;

use crate::error::Result;
use super::{bearer, join_url, ChatAdapter, ProviderRequest, MAX_TOKENS};

#[derive(Debug, Clone, Copy)]
pub struct CohereAdapter;

impl ChatAdapter for CohereAdapter {
    fn build_request(
        &self,
        base_url: &str,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> Result<ProviderRequest> {
        Ok(ProviderRequest {
            url: join_url(base_url, "/chat"),
            headers: vec![bearer(api_key)],
            body: json!({
                "model": model,
                "message": prompt,
                "max_tokens": MAX_TOKENS,
            }),
        })
    }

    fn reply_pointer(&self) -> &'static str {
        "/text"
    }
}
