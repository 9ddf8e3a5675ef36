//! # Sprout Agent
//!
//! The agent is the decision-making caller of the plant engine:
//! 1. The operator asks a question ("Does my plant need water?")
//! 2. The LLM sees the plant's capability table as tools
//! 3. Requested tools run on a blocking worker and their results go back
//! 4. Repeat until the model replies TERMINATE or the turn budget runs out
//!
//! The model decides; the engine only measures and waters.

mod agent;
pub mod provider;
mod transcript;

pub use agent::{Agent, AgentConfig, AgentResult, ToolInvocation, DEFAULT_PROMPT, TERMINATE};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
    OpenAIProvider, ProviderConfig, ProviderError, Role, ToolCall, ToolDefinition, Usage,
    UsageTracker,
};
pub use transcript::Transcript;
