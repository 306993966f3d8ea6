//! Policies deciding what to do after failed requests and dropped connections.
mod reconnection_policy;
mod retry_policy;

pub use crate::retry::reconnection_policy::{
    ConstantReconnectionPolicy, ExponentialReconnectionPolicy, NeverReconnectionPolicy,
    ReconnectionPolicy, ReconnectionSchedule,
};
pub use crate::retry::retry_policy::{
    DefaultRetryPolicy, DefaultRetrySession, FallthroughRetryPolicy, FallthroughRetrySession,
    NextNodeRetryPolicy, QueryInfo, RetryDecision, RetryPolicy, RetrySession,
};

#[cfg(test)]
pub use crate::retry::reconnection_policy::MockReconnectionPolicy;
