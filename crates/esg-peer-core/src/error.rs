use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EsgPeerError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Configuration error: missing required field(s): {}", fields.join(", "))]
    Configuration { fields: Vec<String> },

    #[error("Benchmark not found for '{metric}' at {location}")]
    BenchmarkNotFound { metric: String, location: String },

    #[error("Malformed benchmark '{location}': {reason}")]
    BenchmarkFormat { location: String, reason: String },

    #[error("No usable value for '{metric}'")]
    MissingValue { metric: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Degenerate fit for '{metric}': {reason}")]
    DegenerateFit { metric: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: f64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EsgPeerError {
    /// Whether a failure should only skip the current metric rather than
    /// abort the whole request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EsgPeerError::BenchmarkNotFound { .. }
                | EsgPeerError::BenchmarkFormat { .. }
                | EsgPeerError::MissingValue { .. }
                | EsgPeerError::InsufficientData(_)
                | EsgPeerError::DegenerateFit { .. }
        )
    }
}

impl From<serde_json::Error> for EsgPeerError {
    fn from(e: serde_json::Error) -> Self {
        EsgPeerError::SerializationError(e.to_string())
    }
}

impl From<csv::Error> for EsgPeerError {
    fn from(e: csv::Error) -> Self {
        EsgPeerError::SerializationError(e.to_string())
    }
}
