//! GraphQL response body and error entries.
//!
//! Execution problems are reported in-band as `errors` entries carrying an
//! `extensions.code`; the HTTP status is derived from those codes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error codes placed in `extensions.code`.
pub mod codes {
    /// The document is not syntactically valid GraphQL.
    pub const GRAPHQL_PARSE_FAILED: &str = "GRAPHQL_PARSE_FAILED";

    /// The document cannot be executed against the supergraph.
    pub const GRAPHQL_VALIDATION_FAILED: &str = "GRAPHQL_VALIDATION_FAILED";

    /// A subgraph could not be reached or returned an unusable response.
    pub const SUBGRAPH_FETCH_FAILED: &str = "SUBGRAPH_FETCH_FAILED";

    /// Default code for errors reported by a subgraph.
    pub const DOWNSTREAM_SERVICE_ERROR: &str = "DOWNSTREAM_SERVICE_ERROR";

    /// No supergraph has been composed yet.
    pub const SUPERGRAPH_NOT_READY: &str = "SUPERGRAPH_NOT_READY";

    /// The operation type is not allowed for this HTTP method.
    pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";
}

/// Position of an error in the request document (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl GraphQlError {
    /// Build an error with a message and an `extensions.code`.
    pub fn new(message: impl Into<String>, code: &str) -> Self {
        let mut extensions = Map::new();
        extensions.insert("code".to_string(), Value::String(code.to_string()));
        Self {
            message: message.into(),
            extensions,
            ..Self::default()
        }
    }

    /// Attach a location.
    pub fn at(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// The `extensions.code` value, if any.
    pub fn code(&self) -> Option<&str> {
        self.extensions.get("code").and_then(Value::as_str)
    }

    /// Tag an error returned by a subgraph with the service it came from.
    ///
    /// Errors without a code receive `DOWNSTREAM_SERVICE_ERROR`.
    pub fn from_service(mut self, service_name: &str) -> Self {
        self.extensions.insert(
            "serviceName".to_string(),
            Value::String(service_name.to_string()),
        );
        if self.code().is_none() {
            self.extensions.insert(
                "code".to_string(),
                Value::String(codes::DOWNSTREAM_SERVICE_ERROR.to_string()),
            );
        }
        self
    }
}

/// A GraphQL response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlResponse {
    /// Absent when the request failed before execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQlError>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl GraphQlResponse {
    /// A response carrying only errors.
    pub fn from_errors(errors: Vec<GraphQlError>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    /// A response carrying a single error.
    pub fn from_error(error: GraphQlError) -> Self {
        Self::from_errors(vec![error])
    }

    /// HTTP status for this response.
    ///
    /// Requests rejected before execution map to 4xx/5xx; anything that
    /// reached execution is 200 with in-band errors.
    pub fn http_status(&self) -> u16 {
        if self.data.is_some() {
            return 200;
        }
        let has_code = |code: &str| self.errors.iter().any(|e| e.code() == Some(code));
        if has_code(codes::METHOD_NOT_ALLOWED) {
            405
        } else if has_code(codes::SUPERGRAPH_NOT_READY) {
            503
        } else if has_code(codes::GRAPHQL_PARSE_FAILED) || has_code(codes::GRAPHQL_VALIDATION_FAILED)
        {
            400
        } else {
            200
        }
    }
}
