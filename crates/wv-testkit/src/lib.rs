//! wv-testkit
//!
//! In-memory stand-ins for every station collaborator, used by the scenario
//! tests under `tests/`. Each fake counts its calls so tests can assert on
//! side effects, and the store and printer can share a [`CallLog`] to check
//! ordering across collaborators.

mod printer;
mod scale;
mod store;

pub use printer::{PrintMode, RecordingPrintSink};
pub use scale::{ScriptStep, ScriptedScale};
pub use store::{MemoryLineStore, StaticHeaderStore};

use std::sync::{Arc, Mutex, PoisonError};

use wv_schemas::{Header, HeaderId, OrderMetadata, ToleranceBand};

/// Ordered record of collaborator calls, e.g. `"create:WV000100001"`.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Header with an absolute ±0.1 kg band and no order metadata.
pub fn header(id: HeaderId, standard_weight: Option<f64>, allow_print: bool) -> Header {
    Header {
        id,
        standard_weight,
        tolerance: Some(ToleranceBand::Absolute { kg: 0.1 }),
        allow_print,
        order: OrderMetadata {
            contract_no: Some(format!("CT-{id}")),
            product_name: Some("BOPF".to_string()),
            ..OrderMetadata::default()
        },
    }
}
