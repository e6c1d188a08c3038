//! wv-runtime
//!
//! The station controller: polls the scale for the selected header, keeps the
//! current verdict, serialises line writes and hands committed lines to the
//! print gate. See [`controller`] for the invariants it enforces.

pub mod controller;
mod outcome;
mod status;

pub use controller::{Collaborators, ControllerBuilder, ReconciliationController};
pub use outcome::{IgnoreReason, SubmitError, SubmitOutcome};
pub use status::{StationEvent, StationStatus};

use std::sync::Arc;

use anyhow::{Context, Result};
use wv_audit::AuditWriter;
use wv_config::StationConfig;
use wv_print::{PrintGate, PrintSink};

/// Open (and resume) the audit trail configured for the station, if any.
pub fn open_audit(config: &StationConfig) -> Result<Option<AuditWriter>> {
    let Some(audit) = &config.audit else {
        return Ok(None);
    };
    let writer = AuditWriter::resume(&audit.path, audit.hash_chain)
        .with_context(|| format!("open station audit trail {:?}", audit.path))?;
    Ok(Some(writer))
}

/// Print gate configured from the station's print section.
pub fn print_gate(sink: Arc<dyn PrintSink>, config: &StationConfig) -> Arc<PrintGate> {
    Arc::new(PrintGate::new(sink, config.print.timeout, config.print.link))
}
