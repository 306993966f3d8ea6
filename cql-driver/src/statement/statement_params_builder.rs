use derivative::Derivative;
use std::sync::Arc;
use std::time::Duration;

use crate::consistency::Consistency;
use crate::query::{QueryParams, QueryValues};
use crate::retry::RetryPolicy;
use crate::speculative_execution::SpeculativeExecutionPolicy;
use crate::statement::StatementParams;
use crate::types::{CBytes, CInt, CLong};

#[derive(Default, Derivative)]
#[derivative(Debug)]
pub struct StatementParamsBuilder {
    consistency: Consistency,
    values: Option<QueryValues>,
    with_names: bool,
    skip_metadata: bool,
    page_size: Option<CInt>,
    paging_state: Option<CBytes>,
    serial_consistency: Option<Consistency>,
    timestamp: Option<CLong>,
    is_idempotent: bool,
    keyspace: Option<String>,
    timeout: Option<Duration>,
    deadline: Option<Duration>,
    #[derivative(Debug = "ignore")]
    speculative_execution_policy: Option<Arc<dyn SpeculativeExecutionPolicy + Send + Sync>>,
    #[derivative(Debug = "ignore")]
    retry_policy: Option<Arc<dyn RetryPolicy + Send + Sync>>,
}

impl StatementParamsBuilder {
    pub fn new() -> StatementParamsBuilder {
        Default::default()
    }

    /// Sets new statement consistency
    #[must_use]
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Sets new statement values.
    #[must_use]
    pub fn with_values(mut self, values: QueryValues) -> Self {
        self.with_names = values.has_names();
        self.values = Some(values);
        self
    }

    /// Asks the server to skip result metadata. Only valid for prepared statements.
    #[must_use]
    pub fn with_skip_metadata(mut self, skip_metadata: bool) -> Self {
        self.skip_metadata = skip_metadata;
        self
    }

    /// Sets new page size.
    #[must_use]
    pub fn with_page_size(mut self, size: CInt) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Sets new paging state.
    #[must_use]
    pub fn with_paging_state(mut self, state: CBytes) -> Self {
        self.paging_state = Some(state);
        self
    }

    /// Sets new serial consistency.
    #[must_use]
    pub fn with_serial_consistency(mut self, serial_consistency: Consistency) -> Self {
        self.serial_consistency = Some(serial_consistency);
        self
    }

    /// Sets new timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: CLong) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets new keyspace.
    #[must_use]
    pub fn with_keyspace(mut self, keyspace: String) -> Self {
        self.keyspace = Some(keyspace);
        self
    }

    /// Marks the statement as idempotent or not
    #[must_use]
    pub fn idempotent(mut self, value: bool) -> Self {
        self.is_idempotent = value;
        self
    }

    /// Sets the timeout of a single attempt.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the overall time limit of the statement.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets custom statement speculative execution policy.
    #[must_use]
    pub fn with_speculative_execution_policy(
        mut self,
        speculative_execution_policy: Arc<dyn SpeculativeExecutionPolicy + Send + Sync>,
    ) -> Self {
        self.speculative_execution_policy = Some(speculative_execution_policy);
        self
    }

    /// Sets custom statement retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: Arc<dyn RetryPolicy + Send + Sync>) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    #[must_use]
    pub fn build(self) -> StatementParams {
        StatementParams {
            query_params: QueryParams {
                consistency: self.consistency,
                with_names: self.with_names,
                values: self.values,
                skip_metadata: self.skip_metadata,
                page_size: self.page_size,
                paging_state: self.paging_state,
                serial_consistency: self.serial_consistency,
                timestamp: self.timestamp,
            },
            is_idempotent: self.is_idempotent,
            keyspace: self.keyspace,
            timeout: self.timeout,
            deadline: self.deadline,
            speculative_execution_policy: self.speculative_execution_policy,
            retry_policy: self.retry_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use maplit::hashmap;
    use std::time::Duration;

    use crate::consistency::Consistency;
    use crate::query::QueryValues;
    use crate::statement::StatementParamsBuilder;
    use crate::types::value::Value;

    #[test]
    fn should_build_params_with_named_values() {
        let params = StatementParamsBuilder::new()
            .with_consistency(Consistency::LocalQuorum)
            .with_values(QueryValues::NamedValues(hashmap! {
                "id".to_string() => Value::new(1i32),
            }))
            .with_keyspace("ks".into())
            .with_timeout(Duration::from_secs(1))
            .idempotent(true)
            .build();

        assert!(params.query_params.with_names);
        assert_eq!(params.query_params.consistency, Consistency::LocalQuorum);
        assert_eq!(params.keyspace.as_deref(), Some("ks"));
        assert_eq!(params.timeout, Some(Duration::from_secs(1)));
        assert!(params.deadline.is_none());
        assert!(params.is_idempotent);
    }
}
