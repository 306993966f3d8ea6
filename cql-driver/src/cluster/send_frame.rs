use derive_more::Display;
use futures::stream::{FuturesUnordered, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::vec;
use tokio::time::{sleep, timeout};
use tracing::*;

use crate::cluster::topology::Node;
use crate::cluster::ConnectionManager;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::load_balancing::QueryPlan;
use crate::retry::{QueryInfo, RetryDecision, RetryPolicy};
use crate::speculative_execution::{Context, SpeculativeExecutionPolicy};
use crate::transport::CqlTransport;

/// Policies and limits applied to a single logical request.
pub(crate) struct ExecutionOptions<'a> {
    pub is_idempotent: bool,
    pub timeout: Duration,
    pub deadline: Option<Duration>,
    pub retry_policy: &'a (dyn RetryPolicy + Send + Sync),
    pub speculative_execution_policy: Option<&'a (dyn SpeculativeExecutionPolicy + Send + Sync)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum RequestState {
    Pending,
    #[display("Sent({_0})")]
    Sent(SocketAddr),
    Succeeded,
    Retrying,
    Failed,
}

// errors of an execution which did not succeed
#[derive(Default)]
struct ExecutionFailure {
    // error of the last attempt
    last_error: Option<Error>,
    // error of the last node skipped without an attempt
    skip_error: Option<Error>,
}

// shared by all executions of a request, so each node is used by at most one of them
struct PlanCursor<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static> {
    nodes: Mutex<vec::IntoIter<Arc<Node<T, CM>>>>,
    attempted: Mutex<Vec<SocketAddr>>,
}

impl<T: CqlTransport, CM: ConnectionManager<T>> PlanCursor<T, CM> {
    fn new(query_plan: QueryPlan<T, CM>) -> Self {
        PlanCursor {
            nodes: Mutex::new(query_plan.into_iter()),
            attempted: Default::default(),
        }
    }

    fn next_node(&self) -> Option<Arc<Node<T, CM>>> {
        self.nodes.lock().unwrap().next()
    }

    fn has_nodes(&self) -> bool {
        self.nodes.lock().unwrap().len() > 0
    }

    fn mark_attempted(&self, address: SocketAddr) {
        let mut attempted = self.attempted.lock().unwrap();
        if attempted.last() != Some(&address) {
            attempted.push(address);
        }
    }

    fn attempted(&self) -> Vec<SocketAddr> {
        self.attempted.lock().unwrap().clone()
    }
}

/// Sends the frame to nodes of the query plan, retrying and speculatively executing it as
/// configured, and returns the first successful response.
pub(crate) async fn send_frame<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static>(
    frame: &Frame,
    query_plan: QueryPlan<T, CM>,
    options: &ExecutionOptions<'_>,
) -> Result<Frame> {
    let cursor = PlanCursor::new(query_plan);

    let Some(deadline) = options.deadline else {
        return run_executions(frame, &cursor, options).await;
    };

    // dropping the executions releases their stream ids, but keeps connections open
    timeout(deadline, run_executions(frame, &cursor, options))
        .await
        .map_err(|_| {
            let attempted = cursor.attempted();
            debug!(?attempted, "Request deadline exceeded.");
            Error::Timeout(format!(
                "Request deadline of {deadline:?} exceeded after attempting nodes {attempted:?}"
            ))
        })
        .and_then(|result| result)
}

async fn run_executions<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static>(
    frame: &Frame,
    cursor: &PlanCursor<T, CM>,
    options: &ExecutionOptions<'_>,
) -> Result<Frame> {
    let speculative_execution_policy = options
        .speculative_execution_policy
        .filter(|_| options.is_idempotent);

    let mut executions = FuturesUnordered::new();
    executions.push(execute(frame, cursor, options));

    let mut last_error = None;
    let mut skip_error = None;

    loop {
        let next_execution_delay = speculative_execution_policy
            .filter(|_| cursor.has_nodes())
            .and_then(|policy| policy.execution_interval(&Context::new(executions.len())));

        tokio::select! {
            result = executions.next() => match result {
                Some(Ok(response)) => return Ok(response),
                Some(Err(failure)) => {
                    if failure.last_error.is_some() {
                        last_error = failure.last_error;
                    }

                    if failure.skip_error.is_some() {
                        skip_error = failure.skip_error;
                    }

                    if executions.is_empty() {
                        break;
                    }
                }
                None => break,
            },
            _ = sleep(next_execution_delay.unwrap_or_default()), if next_execution_delay.is_some() => {
                debug!(running_executions = executions.len(), "Starting speculative execution.");
                executions.push(execute(frame, cursor, options));
            }
        }
    }

    // skipped nodes only explain the failure when nothing was attempted
    let source = last_error
        .or(skip_error)
        .unwrap_or_else(|| "No nodes available in query plan!".into());
    Err(Error::TerminalFailure {
        attempted: cursor.attempted(),
        source: Box::new(source),
    })
}

// Runs one execution until success, retry policy refusal or plan exhaustion.
async fn execute<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static>(
    frame: &Frame,
    cursor: &PlanCursor<T, CM>,
    options: &ExecutionOptions<'_>,
) -> std::result::Result<Frame, ExecutionFailure> {
    let mut retry_session = options.retry_policy.new_session();
    let mut state = RequestState::Pending;
    let mut attempt = 0;
    let mut failure = ExecutionFailure::default();

    'next_node: while let Some(node) = cursor.next_node() {
        let broadcast_rpc_address = node.broadcast_rpc_address();

        loop {
            let transport = match node.persistent_connection().await {
                Ok(transport) => transport,
                Err(error) => {
                    debug!(%error, %broadcast_rpc_address, "Skipping node without usable connections.");
                    failure.skip_error = Some(error);
                    continue 'next_node;
                }
            };

            state = RequestState::Sent(broadcast_rpc_address);
            trace!(%state, attempt, "Sending request.");

            let result = timeout(options.timeout, transport.write_frame(frame))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Timeout(format!(
                        "No response from {broadcast_rpc_address} within {:?}",
                        options.timeout
                    )))
                });

            let error = match result {
                Ok(response) => {
                    state = RequestState::Succeeded;
                    trace!(%state, attempt, "Request finished.");
                    return Ok(response);
                }
                Err(error @ Error::Busy(_)) => {
                    debug!(%error, %broadcast_rpc_address, "Skipping busy node.");
                    failure.skip_error = Some(error);
                    continue 'next_node;
                }
                Err(error) => error,
            };

            attempt += 1;
            cursor.mark_attempted(broadcast_rpc_address);

            let decision =
                retry_session.decide(QueryInfo::new(&error, attempt, options.is_idempotent));

            warn!(%error, %broadcast_rpc_address, attempt, %decision, "Request attempt failed.");
            failure.last_error = Some(error);

            match decision {
                RetryDecision::RetrySameNode => {
                    state = RequestState::Retrying;
                }
                RetryDecision::RetryNextNode => {
                    state = RequestState::Retrying;
                    continue 'next_node;
                }
                RetryDecision::DontRetry => break 'next_node,
            }
        }
    }

    if state != RequestState::Pending {
        state = RequestState::Failed;
    }

    trace!(%state, attempt, "Execution finished without success.");
    Err(failure)
}
