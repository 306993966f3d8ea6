//! Native binary protocol codec for column-store databases speaking CQL.
//!
//! The crate is transport-agnostic: it knows how to build and parse [frames](crate::frame::Frame),
//! how to describe column types ([`TypeSpec`](crate::types::TypeSpec)) and how to move native
//! values ([`CqlValue`](crate::types::CqlValue)) to and from their wire representation. The
//! `cql-driver` crate builds connections, pools and request execution on top of it.

pub mod authenticators;
pub mod consistency;
pub mod error;
pub mod events;
pub mod frame;
pub mod query;
pub mod types;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
