//! wv-store
//!
//! Collaborator boundary for persisted headers and weight lines.
//!
//! The store is external: this crate defines only the traits the core calls
//! through, the error they fail with, and read-side helpers over the line
//! history. Serial numbers, carton index numbers and revisions are assigned
//! exclusively by the store; the core never computes them.

mod history;

pub use history::{HistorySummary, LineHistory};

use wv_schemas::{Header, HeaderId, LineCorrection, NewLine, WeightLine};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Validation or transport failure reported by a store.
///
/// `status` carries the backend's HTTP-style status code when one exists.
/// The message is surfaced to the operator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    pub status: Option<u16>,
    pub message: String,
}

impl StoreError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Network-level failure with no backend status.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Some(404), message)
    }
}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// Durable append-only store of weight lines.
///
/// # Contract
/// - `create` assigns `id`, `serial`, `index_no` and `revision = 0`.
/// - A failed `create` may or may not have persisted; callers must not retry
///   it automatically.
/// - `list_by_header` returns lines newest-first by `recorded_at`.
/// - `update` applies a correction and bumps `revision`; it never deletes.
#[async_trait::async_trait]
pub trait LineStore: Send + Sync {
    async fn create(&self, header_id: HeaderId, line: NewLine) -> Result<WeightLine, StoreError>;

    async fn list_by_header(&self, header_id: HeaderId) -> Result<Vec<WeightLine>, StoreError>;

    async fn update(&self, correction: LineCorrection) -> Result<WeightLine, StoreError>;
}

/// Read-only header lookup.
#[async_trait::async_trait]
pub trait HeaderStore: Send + Sync {
    async fn get(&self, header_id: HeaderId) -> Result<Header, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_displays_message_verbatim() {
        let e = StoreError::new(Some(422), "gross_weight must be >= 0");
        assert_eq!(e.to_string(), "gross_weight must be >= 0");
        assert_eq!(StoreError::network("connection reset").status, None);
    }
}
