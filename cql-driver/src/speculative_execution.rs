//! Speculative executions: starting another attempt of a slow request on the next node.
//!
//! When a node stalls (e.g. during a long GC pause), every request it coordinates stalls with it.
//! A speculative execution sends the same request to the next node of the query plan while the
//! first attempt is still running. Earlier executions are not cancelled; whichever answers first
//! wins and the remaining ones are dropped.
//!
//! Only idempotent statements are executed speculatively, since a mutation could otherwise be
//! applied more than once. Each execution retries independently according to the retry policy.

use derive_more::Constructor;
use std::time::Duration;

/// Current speculative execution context.
#[derive(Constructor, Debug, Clone, Copy)]
pub struct Context {
    /// Number of executions of the request currently in progress.
    pub running_executions: usize,
}

/// Decides when to start additional executions of a slow request.
pub trait SpeculativeExecutionPolicy {
    /// Returns the delay after which the next execution starts. `None` means no more executions.
    fn execution_interval(&self, context: &Context) -> Option<Duration>;
}

/// Starts at most `max_executions` executions in total, separated by a constant delay.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct ConstantSpeculativeExecutionPolicy {
    max_executions: usize,
    delay: Duration,
}

impl SpeculativeExecutionPolicy for ConstantSpeculativeExecutionPolicy {
    fn execution_interval(&self, context: &Context) -> Option<Duration> {
        (context.running_executions < self.max_executions).then_some(self.delay)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::speculative_execution::{
        ConstantSpeculativeExecutionPolicy, Context, SpeculativeExecutionPolicy,
    };

    #[test]
    fn should_limit_executions() {
        let policy = ConstantSpeculativeExecutionPolicy::new(2, Duration::from_millis(50));

        assert_eq!(
            policy.execution_interval(&Context::new(1)),
            Some(Duration::from_millis(50))
        );
        assert_eq!(policy.execution_interval(&Context::new(2)), None);
    }
}
