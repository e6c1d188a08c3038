//! wv-scale
//!
//! Weight source boundary.
//!
//! This crate owns the [`WeightSource`] trait, its error type, the indicator
//! frame parser and one concrete adapter for an HTTP scale bridge. It does
//! **not** poll: pacing, retry and offline handling belong to the
//! reconciliation controller in `wv-runtime`.

pub mod frame;
pub mod http;

use wv_schemas::WeightReading;

pub use frame::parse_scale_output;
pub use http::HttpScaleSource;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`WeightSource`] may return. Every variant counts as one failed
/// attempt for retry purposes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("scale read timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },
    #[error("malformed scale data: {0}")]
    Malformed(String),
    #[error("scale connection error: {0}")]
    Connection(String),
    #[error("scale bridge returned http status {code}")]
    Status { code: u16 },
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// A physical or simulated scale.
///
/// Implementations must be `Send + Sync` so the controller can hold an
/// `Arc<dyn WeightSource>` inside its polling task.
#[async_trait::async_trait]
pub trait WeightSource: Send + Sync {
    /// Human-readable name for logs (e.g. `"http-bridge"`).
    fn name(&self) -> &'static str;

    /// Take one reading.
    async fn read(&self) -> Result<WeightReading, ReadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_display() {
        assert_eq!(
            ReadError::Timeout { after_ms: 5000 }.to_string(),
            "scale read timed out after 5000 ms"
        );
        assert_eq!(
            ReadError::Status { code: 503 }.to_string(),
            "scale bridge returned http status 503"
        );
    }
}
