//! Apollo Tracing (`extensions.tracing`) for gateway responses.
//!
//! Offsets and durations are in nanoseconds relative to the start of the
//! request. Resolver entries are recorded per root field with the timing of
//! the subgraph fetch that resolved it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Format version of the tracing extension.
const TRACING_VERSION: u8 = 1;

/// Start offset and duration of a request phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTrace {
    pub start_offset: u64,
    pub duration: u64,
}

/// Timing of one resolved field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverTrace {
    pub path: Vec<Value>,
    pub parent_type: String,
    pub field_name: String,
    pub return_type: String,
    pub start_offset: u64,
    pub duration: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionTrace {
    pub resolvers: Vec<ResolverTrace>,
}

/// The `extensions.tracing` value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingExtension {
    pub version: u8,
    pub start_time: String,
    pub end_time: String,
    pub duration: u64,
    pub parsing: PhaseTrace,
    pub validation: PhaseTrace,
    pub execution: ExecutionTrace,
}

/// Collects timings while a request is processed.
#[derive(Debug)]
pub struct RequestTimer {
    started_at: DateTime<Utc>,
    start: Instant,
    parsing: PhaseTrace,
    validation: PhaseTrace,
    resolvers: Vec<ResolverTrace>,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            start: Instant::now(),
            parsing: PhaseTrace::default(),
            validation: PhaseTrace::default(),
            resolvers: Vec::new(),
        }
    }

    /// Time elapsed since the request started.
    pub fn offset(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record the parsing phase as running from `started` until now.
    pub fn record_parsing(&mut self, started: Duration) {
        self.parsing = self.phase_since(started);
    }

    /// Record the validation phase as running from `started` until now.
    pub fn record_validation(&mut self, started: Duration) {
        self.validation = self.phase_since(started);
    }

    /// Record a root field resolved by a fetch that ran for `duration`
    /// starting at offset `started`.
    pub fn record_resolver(
        &mut self,
        response_key: &str,
        parent_type: &str,
        field_name: &str,
        return_type: &str,
        started: Duration,
        duration: Duration,
    ) {
        self.resolvers.push(ResolverTrace {
            path: vec![Value::String(response_key.to_string())],
            parent_type: parent_type.to_string(),
            field_name: field_name.to_string(),
            return_type: return_type.to_string(),
            start_offset: nanos(started),
            duration: nanos(duration),
        });
    }

    /// Close the trace.
    pub fn finish(self) -> TracingExtension {
        let elapsed = self.start.elapsed();
        let ended_at = self.started_at
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());

        TracingExtension {
            version: TRACING_VERSION,
            start_time: self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            end_time: ended_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            duration: nanos(elapsed),
            parsing: self.parsing,
            validation: self.validation,
            execution: ExecutionTrace {
                resolvers: self.resolvers,
            },
        }
    }

    fn phase_since(&self, started: Duration) -> PhaseTrace {
        PhaseTrace {
            start_offset: nanos(started),
            duration: nanos(self.offset().saturating_sub(started)),
        }
    }
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
