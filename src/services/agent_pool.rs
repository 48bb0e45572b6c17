//! Bounded-concurrency execution pool for agent tasks.
//!
//! The pool owns `pool_size` client slots, a shared request rate limiter and
//! a retry policy. Every task produces exactly one [`AgentResult`]; remote
//! failures, timeouts and a closed pool all surface as failed results.

use async_trait::async_trait;
use futures::stream::{BoxStream, FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::ApiError;
use crate::domain::models::{AgentResult, AgentTask, Config, ModelTier, PoolStatsSnapshot};
use crate::domain::ports::{CompletionClient, CompletionRequest, WaveExecutor};
use crate::infrastructure::claude::{
    ClaudeClient, ClaudeClientConfig, RequestRateLimiter, RetryPolicy,
};
use crate::services::pricing::PoolStatistics;

/// Error text of results produced after [`AgentPool::close`]
pub const POOL_CLOSED: &str = "pool is closed";

/// Pool tuning independent of the clients
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Maximum remote calls in flight
    pub pool_size: usize,
    /// Deadline per task covering every attempt
    pub task_timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub requests_per_minute: u32,
}

impl PoolOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pool_size: config.pool.pool_size.max(1),
            task_timeout: config.pool.task_timeout_ms.map(Duration::from_millis),
            retry: RetryPolicy::from_config(&config.retry),
            requests_per_minute: config.rate_limit.requests_per_minute,
        }
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Execution pool running tasks against completion clients
pub struct AgentPool {
    clients: RwLock<Vec<Arc<dyn CompletionClient>>>,
    semaphore: Semaphore,
    rate_limiter: RequestRateLimiter,
    retry: RetryPolicy,
    task_timeout: Option<Duration>,
    pool_size: usize,
    stats: Mutex<PoolStatistics>,
    results: Mutex<HashMap<String, AgentResult>>,
    closed: AtomicBool,
}

impl AgentPool {
    /// Create a pool over the given client slots.
    ///
    /// Tasks are assigned to slots round-robin by their position in each
    /// submitted batch. A pool without clients behaves as closed.
    pub fn new(clients: Vec<Arc<dyn CompletionClient>>, options: PoolOptions) -> Self {
        let pool_size = options.pool_size.max(1);
        info!(
            pool_size,
            clients = clients.len(),
            max_attempts = options.retry.max_attempts(),
            requests_per_minute = options.requests_per_minute,
            "agent pool created"
        );

        Self {
            closed: AtomicBool::new(clients.is_empty()),
            clients: RwLock::new(clients),
            semaphore: Semaphore::new(pool_size),
            rate_limiter: RequestRateLimiter::per_minute(options.requests_per_minute),
            retry: options.retry,
            task_timeout: options.task_timeout,
            pool_size,
            stats: Mutex::new(PoolStatistics::new()),
            results: Mutex::new(HashMap::new()),
        }
    }

    /// Create a pool with one HTTP client per slot.
    pub fn connect(config: &Config, api_key: &str) -> Result<Self, ApiError> {
        let options = PoolOptions::from_config(config);
        let client_config = ClaudeClientConfig::from_api_config(&config.api, api_key);
        let clients = (0..options.pool_size)
            .map(|_| {
                ClaudeClient::new(client_config.clone())
                    .map(|client| Arc::new(client) as Arc<dyn CompletionClient>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(clients, options))
    }

    pub const fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release the clients. Later executions yield failed results.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.semaphore.close();
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("agent pool closed");
    }

    /// Snapshot of the usage counters.
    pub fn statistics(&self) -> PoolStatsSnapshot {
        let cached = self.lock_results().len();
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot(self.pool_size, cached)
    }

    /// Last result recorded for `name`.
    pub fn cached_result(&self, name: &str) -> Option<AgentResult> {
        self.lock_results().get(name).cloned()
    }

    /// Every cached result, keyed by task name.
    pub fn results(&self) -> HashMap<String, AgentResult> {
        self.lock_results().clone()
    }

    fn lock_results(&self) -> std::sync::MutexGuard<'_, HashMap<String, AgentResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn client_for(&self, position: usize) -> Option<Arc<dyn CompletionClient>> {
        if self.is_closed() {
            return None;
        }
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        if clients.is_empty() {
            return None;
        }
        Some(Arc::clone(&clients[position % clients.len()]))
    }

    #[instrument(skip_all, fields(task = %task.name, model = %task.model))]
    async fn run_task(
        &self,
        task: AgentTask,
        client: Option<Arc<dyn CompletionClient>>,
    ) -> AgentResult {
        let start = Instant::now();
        let Some(client) = client else {
            return AgentResult::failure(&task.name, &task.model, POOL_CLOSED, 0);
        };
        let Ok(_permit) = self.semaphore.acquire().await else {
            return AgentResult::failure(&task.name, &task.model, POOL_CLOSED, 0);
        };

        debug!("task started");
        let request = CompletionRequest::from(&task);
        let call = self.retry.execute(|| {
            let client = Arc::clone(&client);
            let request = request.clone();
            async move {
                self.rate_limiter.acquire().await;
                client.complete(request).await
            }
        });

        let outcome = match self.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome.map_err(|err| err.to_string()),
                Err(_) => Err(format!("task timed out after {}ms", limit.as_millis())),
            },
            None => call.await.map_err(|err| err.to_string()),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(completion) => {
                let model_tier = ModelTier::from_model_id(&task.model);
                let cost = model_tier.cost(completion.input_tokens, completion.output_tokens);
                debug!(
                    duration_ms,
                    tokens_in = completion.input_tokens,
                    tokens_out = completion.output_tokens,
                    cost,
                    "task succeeded"
                );
                AgentResult {
                    name: task.name.clone(),
                    output: completion.text,
                    success: true,
                    duration_ms,
                    model_used: task.model.clone(),
                    model_tier,
                    tokens_in: completion.input_tokens,
                    tokens_out: completion.output_tokens,
                    cost,
                    error: None,
                    stop_reason: completion.stop_reason,
                }
            }
            Err(message) => {
                warn!(duration_ms, error = %message, "task failed");
                AgentResult::failure(&task.name, &task.model, message, duration_ms)
            }
        };

        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&result);
        self.lock_results()
            .insert(result.name.clone(), result.clone());
        result
    }
}

#[async_trait]
impl WaveExecutor for AgentPool {
    fn execute_stream(&self, tasks: Vec<AgentTask>) -> BoxStream<'_, AgentResult> {
        let pending: FuturesUnordered<_> = tasks
            .into_iter()
            .enumerate()
            .map(|(position, task)| {
                let client = self.client_for(position);
                self.run_task(task, client)
            })
            .collect();
        pending.boxed()
    }
}

impl std::fmt::Debug for AgentPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentPool")
            .field("pool_size", &self.pool_size)
            .field("closed", &self.is_closed())
            .field("retry", &self.retry)
            .field("task_timeout", &self.task_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Completion;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Client replaying scripted outcomes, then succeeding.
    #[derive(Default)]
    struct ScriptedClient {
        script: Mutex<VecDeque<ApiError>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedClient {
        fn failing_with(errors: Vec<ApiError>) -> Self {
            Self {
                script: Mutex::new(errors.into()),
                ..Self::default()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(err) = self.script.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(Completion {
                text: format!("done: {}", request.prompt),
                stop_reason: Some("end_turn".to_string()),
                input_tokens: 1_000_000,
                output_tokens: 1_000_000,
            })
        }
    }

    fn options(pool_size: usize) -> PoolOptions {
        PoolOptions {
            pool_size,
            task_timeout: None,
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
            requests_per_minute: 100_000,
        }
    }

    fn tasks(n: usize) -> Vec<AgentTask> {
        (0..n)
            .map(|i| AgentTask::new(format!("task-{i}"), format!("prompt {i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_one_result_per_task_with_cost() {
        let client = Arc::new(ScriptedClient::default());
        let pool = AgentPool::new(vec![client], options(4));

        let results = pool.execute_wave(tasks(3)).await;
        assert_eq!(results.len(), 3);

        let result = &results["task-1"];
        assert!(result.success);
        assert_eq!(result.output, "done: prompt 1");
        assert_eq!(result.model_tier, ModelTier::Sonnet);
        assert!((result.cost - 18.0).abs() < 1e-9);
        assert_eq!(result.stop_reason.as_deref(), Some("end_turn"));

        let stats = pool.statistics();
        assert_eq!(stats.total_requests, 3);
        assert!((stats.total_cost - 54.0).abs() < 1e-9);
        assert_eq!(stats.cached_results, 3);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let client = Arc::new(ScriptedClient::failing_with(vec![
            ApiError::RateLimitExceeded,
            ApiError::Network("reset".to_string()),
        ]));
        let pool = AgentPool::new(vec![client.clone()], options(1));

        let results = pool.execute_wave(tasks(1)).await;
        assert!(results["task-0"].success);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_yields_failed_result() {
        let client = Arc::new(ScriptedClient::failing_with(vec![
            ApiError::RateLimitExceeded,
            ApiError::RateLimitExceeded,
            ApiError::RateLimitExceeded,
            ApiError::RateLimitExceeded,
        ]));
        let pool = AgentPool::new(vec![client.clone()], options(1));

        let results = pool.execute_wave(tasks(1)).await;
        let result = &results["task-0"];
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Rate limit exceeded - too many requests")
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert_eq!(pool.statistics().total_requests, 0);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let client = Arc::new(ScriptedClient::failing_with(vec![ApiError::InvalidApiKey]));
        let pool = AgentPool::new(vec![client.clone()], options(1));

        let results = pool.execute_wave(tasks(1)).await;
        assert!(!results["task-0"].success);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let client = Arc::new(ScriptedClient::slow(Duration::from_millis(30)));
        let pool = AgentPool::new(vec![client.clone()], options(2));

        let results = pool.execute_wave(tasks(6)).await;
        assert_eq!(results.len(), 6);
        assert!(client.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(client.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_round_robin_slots() {
        let first = Arc::new(ScriptedClient::default());
        let second = Arc::new(ScriptedClient::default());
        let pool = AgentPool::new(vec![first.clone(), second.clone()], options(4));

        pool.execute_wave(tasks(5)).await;
        assert_eq!(first.calls.load(Ordering::SeqCst), 3);
        assert_eq!(second.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_task_timeout() {
        let client = Arc::new(ScriptedClient::slow(Duration::from_millis(500)));
        let mut opts = options(1);
        opts.task_timeout = Some(Duration::from_millis(20));
        let pool = AgentPool::new(vec![client], opts);

        let results = pool.execute_wave(tasks(1)).await;
        let result = &results["task-0"];
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("task timed out after 20ms"));
    }

    #[tokio::test]
    async fn test_close_fails_later_executions() {
        let client = Arc::new(ScriptedClient::default());
        let pool = AgentPool::new(vec![client.clone()], options(2));

        pool.close();
        pool.close();
        assert!(pool.is_closed());

        let results = pool.execute_wave(tasks(2)).await;
        assert_eq!(results.len(), 2);
        assert!(results
            .values()
            .all(|r| !r.success && r.error.as_deref() == Some(POOL_CLOSED)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_last_write_wins() {
        let client = Arc::new(ScriptedClient::failing_with(vec![ApiError::InvalidApiKey]));
        let pool = AgentPool::new(vec![client], options(1));

        pool.execute_wave(tasks(1)).await;
        assert!(!pool.cached_result("task-0").unwrap().success);

        pool.execute_wave(tasks(1)).await;
        assert!(pool.cached_result("task-0").unwrap().success);
        assert_eq!(pool.results().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_yields_in_completion_order() {
        let client = Arc::new(ScriptedClient::default());
        let pool = AgentPool::new(vec![client], options(4));

        let names: Vec<String> = pool
            .execute_stream(tasks(4))
            .map(|r| r.name)
            .collect()
            .await;
        assert_eq!(names.len(), 4);
    }
}
