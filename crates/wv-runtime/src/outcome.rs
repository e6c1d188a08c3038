use serde::Serialize;
use wv_print::PrintOutcome;
use wv_schemas::{HeaderId, LineId, LineStatus, WeightLine};
use wv_store::StoreError;

/// Why a trigger was dropped without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Another submit or reweigh is still running.
    InFlight,
    /// Too soon after the previous accepted trigger.
    Debounced,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A new line was persisted; `print` is what the gate did with it.
    Committed { line: WeightLine, print: PrintOutcome },
    /// An existing line was corrected by a reweigh.
    Corrected { line: WeightLine, print: PrintOutcome },
    Ignored(IgnoreReason),
    /// The store answered after the header was switched. Nothing was applied
    /// to the current session and nothing was printed.
    Discarded { header_id: HeaderId },
}

/// Operator-visible refusal or failure of a station action.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    #[error("no header selected")]
    NoHeader,
    #[error("header {header_id} has no standard weight")]
    NoStandardWeight { header_id: HeaderId },
    #[error("no verified reading to submit")]
    NotVerified,
    #[error("line {line_id} belongs to header {line_header}, not the selected header {selected}")]
    WrongHeader {
        line_id: LineId,
        line_header: HeaderId,
        selected: HeaderId,
    },
    #[error("line {line_id} is {} and cannot be corrected", .status.as_str())]
    NotCorrectable { line_id: LineId, status: LineStatus },
    #[error(transparent)]
    Store(#[from] StoreError),
}
