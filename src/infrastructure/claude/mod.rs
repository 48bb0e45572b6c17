pub mod client;
pub mod errors;
pub mod rate_limiter;
pub mod retry;
pub mod types;

pub use client::{ClaudeClient, ClaudeClientConfig, ANTHROPIC_VERSION};
pub use rate_limiter::RequestRateLimiter;
pub use retry::RetryPolicy;
pub use types::{ContentBlock, Message, MessageRequest, MessageResponse, StopReason, Usage};
