//! # Gateway Test Utilities
//!
//! Shared test utilities for the GraphQL gateway.
//!
//! This crate provides:
//! - Server test harness (`TestGatewayServer` for E2E tests)
//! - Mock subgraphs (`MockSubgraph`, a wiremock server publishing SDL)
//! - RS256 token minting (`TestKeypair` with fixed test keys)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let subgraphs = MockSubgraph::start_three(["type Query { a: Int }", "type Query { b: Int }", "type Query { c: Int }"]).await;
//!     let server = TestGatewayServer::spawn(&subgraphs).await?;
//!
//!     let response = reqwest::Client::new()
//!         .post(server.url())
//!         .bearer_auth(server.token())
//!         .json(&serde_json::json!({ "query": "{ a }" }))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod subgraphs;
pub mod token;

// Re-export commonly used items
pub use server_harness::*;
pub use subgraphs::*;
pub use token::*;
