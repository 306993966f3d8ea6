use derive_more::Display;

use crate::error::{Error, ErrorKind};
use crate::frame::message_error::{
    AdditionalErrorInfo, ErrorBody, ReadTimeoutError, WriteTimeoutError, WriteType,
};

#[derive(Debug, PartialEq, Eq, Ord, PartialOrd, Hash, Copy, Clone, Display)]
pub enum RetryDecision {
    /// Borrows a new connection from the same node and sends the request again.
    RetrySameNode,
    /// Moves on to the next node of the query plan.
    RetryNextNode,
    /// Returns the error to the caller.
    DontRetry,
}

/// Information about a failed query.
#[derive(Debug)]
pub struct QueryInfo<'a> {
    pub error: &'a Error,
    pub error_kind: ErrorKind,
    /// Number of attempts made so far, including the failed one.
    pub attempt: usize,
    pub is_idempotent: bool,
}

impl<'a> QueryInfo<'a> {
    pub fn new(error: &'a Error, attempt: usize, is_idempotent: bool) -> Self {
        QueryInfo {
            error,
            error_kind: error.kind(),
            attempt,
            is_idempotent,
        }
    }
}

/// Query-specific information about current state of retrying.
pub trait RetrySession {
    /// Decide what to do with the failing query.
    fn decide(&mut self, query_info: QueryInfo) -> RetryDecision;
}

/// Retry policy determines what to do in case of communication error.
pub trait RetryPolicy {
    /// Called for each new query, starts a session of deciding about retries.
    fn new_session(&self) -> Box<dyn RetrySession + Send + Sync>;
}

/// Forwards all errors directly to the user, never retries
#[derive(Default, Debug, Clone, Copy)]
pub struct FallthroughRetryPolicy;

impl RetryPolicy for FallthroughRetryPolicy {
    fn new_session(&self) -> Box<dyn RetrySession + Send + Sync> {
        Box::new(FallthroughRetrySession)
    }
}

#[derive(Default)]
pub struct FallthroughRetrySession;

impl RetrySession for FallthroughRetrySession {
    fn decide(&mut self, _query_info: QueryInfo) -> RetryDecision {
        RetryDecision::DontRetry
    }
}

/// Always moves to the next node, regardless of the error or idempotency. Useful when every node
/// of the query plan should be tried once.
#[derive(Default, Debug, Clone, Copy)]
pub struct NextNodeRetryPolicy;

impl RetryPolicy for NextNodeRetryPolicy {
    fn new_session(&self) -> Box<dyn RetrySession + Send + Sync> {
        Box::new(NextNodeRetrySession)
    }
}

struct NextNodeRetrySession;

impl RetrySession for NextNodeRetrySession {
    fn decide(&mut self, _query_info: QueryInfo) -> RetryDecision {
        RetryDecision::RetryNextNode
    }
}

/// Default retry policy - retries when there is a high chance that a retry might help.
/// Behaviour based on [DataStax Java Driver](https://docs.datastax.com/en/developer/java-driver/4.10/manual/core/retries/)
#[derive(Default, Debug, Clone, Copy)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn new_session(&self) -> Box<dyn RetrySession + Send + Sync> {
        Box::new(DefaultRetrySession::default())
    }
}

#[derive(Default)]
pub struct DefaultRetrySession {
    was_unavailable_retry: bool,
    was_read_timeout_retry: bool,
    was_write_timeout_retry: bool,
}

impl DefaultRetrySession {
    #[inline]
    fn next_node_if_idempotent(is_idempotent: bool) -> RetryDecision {
        if is_idempotent {
            RetryDecision::RetryNextNode
        } else {
            RetryDecision::DontRetry
        }
    }
}

impl RetrySession for DefaultRetrySession {
    fn decide(&mut self, query_info: QueryInfo) -> RetryDecision {
        let body = match query_info.error {
            Error::Server { body, .. } => body,
            _ => {
                return match query_info.error_kind {
                    ErrorKind::ConnectionClosed | ErrorKind::Timeout | ErrorKind::ConnectError => {
                        Self::next_node_if_idempotent(query_info.is_idempotent)
                    }
                    _ => RetryDecision::DontRetry,
                }
            }
        };

        match body {
            ErrorBody {
                additional_info:
                    AdditionalErrorInfo::Overloaded
                    | AdditionalErrorInfo::Server
                    | AdditionalErrorInfo::Truncate,
                ..
            } => Self::next_node_if_idempotent(query_info.is_idempotent),
            ErrorBody {
                additional_info: AdditionalErrorInfo::Unavailable(_),
                ..
            } => {
                if !self.was_unavailable_retry {
                    self.was_unavailable_retry = true;
                    RetryDecision::RetryNextNode
                } else {
                    RetryDecision::DontRetry
                }
            }
            ErrorBody {
                additional_info: AdditionalErrorInfo::ReadTimeout(error @ ReadTimeoutError { .. }),
                ..
            } => {
                if !self.was_read_timeout_retry
                    && error.received >= error.block_for
                    && !error.replica_has_responded()
                {
                    self.was_read_timeout_retry = true;
                    RetryDecision::RetrySameNode
                } else {
                    RetryDecision::DontRetry
                }
            }
            ErrorBody {
                additional_info: AdditionalErrorInfo::WriteTimeout(error @ WriteTimeoutError { .. }),
                ..
            } => {
                if !self.was_write_timeout_retry
                    && query_info.is_idempotent
                    && error.write_type == WriteType::BatchLog
                {
                    self.was_write_timeout_retry = true;
                    RetryDecision::RetrySameNode
                } else {
                    RetryDecision::DontRetry
                }
            }
            ErrorBody {
                additional_info: AdditionalErrorInfo::IsBootstrapping,
                ..
            } => RetryDecision::RetryNextNode,
            _ => RetryDecision::DontRetry,
        }
    }
}
