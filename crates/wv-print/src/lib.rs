//! wv-print
//!
//! Label printing boundary: the [`PrintSink`] collaborator, the label
//! [`PrintPayload`] and the [`PrintGate`] that decides whether and how often a
//! line's label is printed.

mod gate;
mod payload;

pub use gate::{PrintGate, PrintOutcome, DEFAULT_PRINT_TIMEOUT};
pub use payload::{PrintPayload, LABEL_TIME_FORMAT};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrintError {
    #[error("print device error: {0}")]
    Device(String),
    #[error("print cancelled by operator")]
    Cancelled,
}

/// Renders and prints a label.
///
/// `print` resolves only once the device (or print dialog) has acknowledged
/// completion. The gate applies the timeout; implementations should not.
#[async_trait::async_trait]
pub trait PrintSink: Send + Sync {
    async fn print(&self, payload: PrintPayload) -> Result<(), PrintError>;
}
