use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ApiError;
use crate::domain::models::AgentTask;

/// Single-turn completion request
///
/// One user message with an optional system prompt. This is everything an
/// [`AgentTask`] sends to the remote model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (e.g., "claude-sonnet-4-5-20250929")
    pub model: String,

    /// User message content
    pub prompt: String,

    /// System prompt that sets the context for the conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate in the response
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl From<&AgentTask> for CompletionRequest {
    fn from(task: &AgentTask) -> Self {
        Self {
            model: task.model.clone(),
            prompt: task.prompt.clone(),
            system: task.system_prompt.clone(),
            max_tokens: task.max_tokens,
            temperature: task.temperature,
        }
    }
}

/// Completed generation with usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Text blocks of the response, concatenated
    pub text: String,

    /// Why generation stopped (e.g., "end_turn", "max_tokens")
    pub stop_reason: Option<String>,

    /// Number of tokens in the input (request)
    pub input_tokens: u64,

    /// Number of tokens in the output (response)
    pub output_tokens: u64,
}

/// Port trait for the remote text-generation API
///
/// Implementations perform exactly one remote call per invocation. Retry,
/// rate limiting and concurrency limits belong to the caller so a single
/// policy governs every client slot in a pool.
///
/// Implementations must be `Send + Sync`; methods take `&self` so one client
/// can serve concurrent requests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a request and wait for the complete response
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] classifying the failure; callers decide whether
    /// to retry with [`ApiError::is_transient`].
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ApiError>;
}
