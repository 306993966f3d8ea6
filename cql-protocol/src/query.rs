pub mod prepared_query;
pub mod query_flags;
pub mod query_params;
pub mod query_values;

pub use crate::query::prepared_query::PreparedQuery;
pub use crate::query::query_flags::QueryFlags;
pub use crate::query::query_params::QueryParams;
pub use crate::query::query_values::QueryValues;
