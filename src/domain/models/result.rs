use serde::{Deserialize, Serialize};

use super::tier::ModelTier;

/// Outcome of one task execution.
///
/// Exactly one result exists per execution; a task that exhausts its retries
/// still yields a single failed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Name of the task this result belongs to
    pub name: String,

    /// Concatenated text output (empty on failure)
    pub output: String,

    /// Whether the call succeeded
    pub success: bool,

    /// Wall-clock time of the execution, retries included
    pub duration_ms: u64,

    /// Model identifier the task requested
    pub model_used: String,

    /// Tier the model maps to
    pub model_tier: ModelTier,

    /// Input tokens billed
    pub tokens_in: u64,

    /// Output tokens billed
    pub tokens_out: u64,

    /// Cost in USD
    pub cost: f64,

    /// Error text for failed executions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Why generation stopped, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl AgentResult {
    /// Build a failed result with no token usage.
    pub fn failure(
        name: impl Into<String>,
        model: impl Into<String>,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        let model = model.into();
        Self {
            name: name.into(),
            output: String::new(),
            success: false,
            duration_ms,
            model_tier: ModelTier::from_model_id(&model),
            model_used: model,
            tokens_in: 0,
            tokens_out: 0,
            cost: 0.0,
            error: Some(error.into()),
            stop_reason: None,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens_in + self.tokens_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_result() {
        let result = AgentResult::failure("t1", "claude-opus-4-5-20251101", "boom", 12);
        assert!(!result.success);
        assert_eq!(result.model_tier, ModelTier::Opus);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.total_tokens(), 0);
        assert!(result.output.is_empty());
    }
}
