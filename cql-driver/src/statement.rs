//! Per-statement execution parameters.
mod statement_params;
mod statement_params_builder;

pub use crate::statement::statement_params::StatementParams;
pub use crate::statement::statement_params_builder::StatementParamsBuilder;
