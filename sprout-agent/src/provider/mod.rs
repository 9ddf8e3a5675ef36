//! # LLM Provider Interface
//!
//! A trait-based abstraction for talking to a chat model that supports
//! tool calling.
//!
//! ## Design
//! - `LlmProvider` trait defines the core interface
//! - `OpenAIProvider` covers OpenAI-compatible servers (llama.cpp, vLLM, Ollama)
//! - Usage tracking across a session

pub mod openai;

pub use openai::OpenAIProvider;

use serde::{Deserialize, Serialize};
use sprout_error::{Error, ErrorKind};
use std::collections::HashMap;

// ============================================================================
// Core Types
// ============================================================================

/// A chat message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant turn that asks for tools to be run
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool/function that the model can call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// A tool taking no arguments
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Request parameters for a completion
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub tools: Option<Vec<ToolDefinition>>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Unknown,
}

impl FinishReason {
    pub fn from_api(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Error type for provider operations
#[derive(Debug)]
pub enum ProviderError {
    /// Network/connection error
    Network(String),
    /// API returned an error
    Api { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Rate limited
    RateLimited { retry_after: Option<u64> },
    /// Authentication failed
    AuthenticationFailed,
    /// Other error
    Other(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after {
                    write!(f, " (retry after {}s)", secs)?;
                }
                Ok(())
            }
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        let kind = match &err {
            ProviderError::Network(_) => ErrorKind::NetworkFailed,
            ProviderError::Parse(_) => ErrorKind::ParseFailed,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::AuthenticationFailed => ErrorKind::PermissionDenied,
            ProviderError::Api { .. } | ProviderError::Other(_) => ErrorKind::InferenceFailed,
        };
        let rejected = matches!(&err, ProviderError::Api { status, .. } if *status < 500);
        let error = Error::new(kind, err.to_string())
            .with_operation("provider::complete")
            .set_source(err);
        if rejected {
            error.permanent()
        } else {
            error
        }
    }
}

/// The main LLM provider trait
#[allow(async_fn_in_trait)]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai")
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Send a completion request and get a full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Default endpoint: a llama.cpp server on the local network
pub const DEFAULT_BASE_URL: &str = "http://192.168.1.16:8080/v1";
pub const DEFAULT_MODEL: &str = "Mistral-Small-24B-Instruct-2501-Q6";
/// Local servers ignore the key, but OpenAI clients always send one
pub const DEFAULT_API_KEY: &str = "default";

/// Configuration for creating providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::local(DEFAULT_BASE_URL, DEFAULT_MODEL).with_api_key(DEFAULT_API_KEY)
    }
}

impl ProviderConfig {
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: Some(base_url.into()),
            default_model: Some(model.into()),
            timeout_secs: Some(300),
        }
    }

    /// Apply `MODEL`, `API_KEY` and `BASE_URL` overrides from `lookup`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(model) = lookup("MODEL") {
            self.default_model = Some(model);
        }
        if let Some(key) = lookup("API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("BASE_URL") {
            self.base_url = Some(url);
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

// ============================================================================
// Usage Tracking
// ============================================================================

/// Tracks token usage across multiple calls
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageTracker {
    pub total_calls: usize,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
    pub by_model: HashMap<String, Usage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, model: &str, usage: &Usage) {
        self.total_calls += 1;
        self.total_prompt_tokens += usage.prompt_tokens;
        self.total_completion_tokens += usage.completion_tokens;

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
        entry.total_tokens += usage.total_tokens;
    }
}

// ============================================================================
// Tests
// ============================================================================
