//! Observable station state: the `watch` snapshot and the `broadcast` bus.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;
use wv_print::PrintOutcome;
use wv_retry::RetryPhase;
use wv_schemas::{HeaderId, LineId, Verdict, WeightLine};

/// Point-in-time view of the station, published on every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationStatus {
    pub header_id: Option<HeaderId>,
    pub session_id: Option<Uuid>,
    pub verdict: Verdict,
    /// Scale link.
    pub link: RetryPhase,
    /// Last scale or store error, surfaced verbatim.
    pub last_error: Option<String>,
    pub polling: bool,
    pub printing_allowed: bool,
    pub submitting: bool,
    /// Remark of the last accepted trigger; cleared by the form reset.
    pub remark: Option<String>,
    pub last_line: Option<WeightLine>,
    pub print_link: RetryPhase,
    pub last_print: Option<PrintOutcome>,
}

impl StationStatus {
    pub fn idle() -> Self {
        Self {
            header_id: None,
            session_id: None,
            verdict: Verdict::pending(Utc::now()),
            link: RetryPhase::Idle,
            last_error: None,
            polling: false,
            printing_allowed: false,
            submitting: false,
            remark: None,
            last_line: None,
            print_link: RetryPhase::Idle,
            last_print: None,
        }
    }
}

/// Messages broadcast on the station bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StationEvent {
    SessionSelected { header_id: HeaderId, session_id: Uuid },
    Reading { verdict: Verdict },
    LinkChanged { phase: RetryPhase, error: Option<String> },
    ScaleOffline { attempts: u32, error: Option<String> },
    LineCommitted { line: WeightLine },
    LineCorrected { line: WeightLine },
    SubmitFailed { message: String },
    SubmitDiscarded { header_id: HeaderId },
    PrintFinished { line_id: LineId, revision: u32, outcome: PrintOutcome },
    FormReset,
}
