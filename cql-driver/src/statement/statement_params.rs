use derivative::Derivative;
use std::sync::Arc;
use std::time::Duration;

use crate::query::QueryParams;
use crate::retry::RetryPolicy;
use crate::speculative_execution::SpeculativeExecutionPolicy;

/// Parameters of a single statement execution.
#[derive(Default, Clone, Derivative)]
#[derivative(Debug)]
pub struct StatementParams {
    /// Protocol-level parameters.
    pub query_params: QueryParams,
    /// Is the statement idempotent. Only idempotent statements are retried after connection
    /// errors or executed speculatively.
    pub is_idempotent: bool,
    /// Statement keyspace. If not using a global one, setting it explicitly might help the load
    /// balancer use more appropriate nodes.
    pub keyspace: Option<String>,
    /// Timeout of a single attempt. The session default is used if not set.
    pub timeout: Option<Duration>,
    /// Overall time limit for the statement, covering all retries and speculative executions.
    pub deadline: Option<Duration>,
    /// Custom statement speculative execution policy.
    #[derivative(Debug = "ignore")]
    pub speculative_execution_policy: Option<Arc<dyn SpeculativeExecutionPolicy + Send + Sync>>,
    /// Custom statement retry policy.
    #[derivative(Debug = "ignore")]
    pub retry_policy: Option<Arc<dyn RetryPolicy + Send + Sync>>,
}
