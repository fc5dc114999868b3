//! Background tasks for the gateway.
//!
//! # Tasks
//!
//! - `schema_poller` - Recomposes the supergraph when subgraph schemas change

pub mod schema_poller;

pub use schema_poller::start_schema_poller;
