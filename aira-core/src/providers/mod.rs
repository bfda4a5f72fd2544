//! Provider adapters: one request/response translation per chat API.
//!
//! Every provider is a variant of the closed [`Provider`] enum. Each variant
//! maps to a [`ChatAdapter`] that knows how to shape the outgoing request and
//! where the reply text lives in the response:
//! - **OpenAI-compatible**: OpenAI, DeepSeek, Grok, Mistral, Llama, Copilot
//! - **Claude**: Anthropic Messages API
//! - **Gemini**: `generateContent`, key in the query string
//! - **Cohere**: v1 chat
//! - **Qwen**: DashScope text generation

mod claude;
mod cohere;
mod gemini;
mod openai;
mod qwen;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

pub use claude::{ClaudeAdapter, ANTHROPIC_VERSION};
pub use cohere::CohereAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiCompatible;
pub use qwen::QwenAdapter;

use crate::error::AiraError;

/// Completion budget sent with every request that accepts one.
pub const MAX_TOKENS: u32 = 1000;

// ============================================================================
// Provider
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Claude,
    Gemini,
    Cohere,
    DeepSeek,
    Grok,
    Mistral,
    Qwen,
    Llama,
    Copilot,
}

impl Provider {
    pub const ALL: [Provider; 10] = [
        Provider::OpenAi,
        Provider::Claude,
        Provider::Gemini,
        Provider::Cohere,
        Provider::DeepSeek,
        Provider::Grok,
        Provider::Mistral,
        Provider::Qwen,
        Provider::Llama,
        Provider::Copilot,
    ];

    /// Case-insensitive lookup by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Lower-case wire name, as used in model identifiers and config keys.
    pub fn name(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Claude => "claude",
            Provider::Gemini => "gemini",
            Provider::Cohere => "cohere",
            Provider::DeepSeek => "deepseek",
            Provider::Grok => "grok",
            Provider::Mistral => "mistral",
            Provider::Qwen => "qwen",
            Provider::Llama => "llama",
            Provider::Copilot => "copilot",
        }
    }

    /// Display name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Claude => "Claude",
            Provider::Gemini => "Gemini",
            Provider::Cohere => "Cohere",
            Provider::DeepSeek => "DeepSeek",
            Provider::Grok => "Grok",
            Provider::Mistral => "Mistral",
            Provider::Qwen => "Qwen",
            Provider::Llama => "Llama",
            Provider::Copilot => "Copilot",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi | Provider::Copilot => "https://api.openai.com/v1",
            Provider::Claude => "https://api.anthropic.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Provider::Cohere => "https://api.cohere.ai/v1",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
            Provider::Grok => "https://api.x.ai/v1",
            Provider::Mistral => "https://api.mistral.ai/v1",
            Provider::Qwen => "https://dashscope.aliyuncs.com/api/v1",
            Provider::Llama => "https://api.together.xyz/v1",
        }
    }

    /// Model catalog offered to the user for this provider.
    pub fn models(self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi => &[
                "gpt-4o",
                "gpt-4o-mini",
                "gpt-4-turbo",
                "gpt-4",
                "gpt-3.5-turbo",
                "gpt-3.5-turbo-16k",
            ],
            Provider::Claude => &[
                "claude-sonnet-4-20250514",
                "claude-opus-4-20250514",
                "claude-3-5-sonnet-20241022",
                "claude-3-opus-20240229",
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
            ],
            Provider::Cohere => &["command-r-plus", "command-r", "command", "command-light"],
            Provider::Copilot => &["gpt-4-turbo", "gpt-4"],
            Provider::DeepSeek => &["deepseek-chat", "deepseek-coder"],
            Provider::Gemini => &[
                "gemini-2.0-flash-exp",
                "gemini-1.5-pro",
                "gemini-1.5-flash",
                "gemini-1.0-pro",
            ],
            Provider::Grok => &["grok-beta", "grok-vision-beta"],
            Provider::Llama => &[
                "llama-3.3-70b-instruct",
                "llama-3.1-405b-instruct",
                "llama-3.1-70b-instruct",
                "llama-3.1-8b-instruct",
                "llama-3-70b-instruct",
                "llama-3-8b-instruct",
            ],
            Provider::Mistral => &[
                "mistral-large-latest",
                "mistral-medium-latest",
                "mistral-small-latest",
                "mixtral-8x7b-instruct",
                "mixtral-8x22b-instruct",
            ],
            Provider::Qwen => &[
                "qwen-turbo",
                "qwen-plus",
                "qwen-max",
                "qwen2.5-72b-instruct",
                "qwen2.5-7b-instruct",
            ],
        }
    }

    pub fn adapter(self) -> &'static dyn ChatAdapter {
        match self {
            Provider::OpenAi
            | Provider::DeepSeek
            | Provider::Grok
            | Provider::Mistral
            | Provider::Llama
            | Provider::Copilot => &OpenAiCompatible,
            Provider::Claude => &ClaudeAdapter,
            Provider::Gemini => &GeminiAdapter,
            Provider::Cohere => &CohereAdapter,
            Provider::Qwen => &QwenAdapter,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = AiraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| AiraError::UnsupportedProvider(s.to_string()))
    }
}

// ============================================================================
// ChatAdapter
// ============================================================================

/// A fully shaped outgoing call. `Content-Type: application/json` is implied.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

/// Request/response translation for one provider API shape.
pub trait ChatAdapter: Send + Sync {
    fn build_request(
        &self,
        base_url: &str,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> crate::error::Result<ProviderRequest>;

    /// JSON pointer to the reply text in a successful response.
    fn reply_pointer(&self) -> &'static str;

    /// Pull the reply text out of a response body. `None` when the path is
    /// missing or not a string.
    fn extract_reply(&self, response: &Value) -> Option<String> {
        response
            .pointer(self.reply_pointer())
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

fn bearer(api_key: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", api_key))
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
