//! PrintGate: the single choke-point for label side effects.
//!
//! # Invariants
//!
//! 1. `header.allow_print == false` refuses with [`PrintOutcome::NotAllowed`]
//!    before anything else happens. No sink call, no bookkeeping.
//! 2. The sink is invoked at most once per `(line.id, line.revision)` through
//!    [`PrintGate::maybe_print`]. A correction bumps the revision and therefore
//!    opens a new print cycle. The record only covers the selected header:
//!    [`PrintGate::retain_header`] drops every other header's entries.
//! 3. A line whose print is still in flight answers `AlreadyPending`; a line
//!    whose cycle has finished (any result) answers `AlreadyPrinted`.
//! 4. Timeouts and sink errors are non-fatal outcomes. The persisted line
//!    stands; the gate never asks for the line to be created again.
//! 5. Consecutive failed cycles are counted by the print-channel
//!    [`RetryTracker`]. Once offline, the sink is not invoked until
//!    [`PrintGate::reset_link`].
//!
//! ```text
//!   maybe_print ──► allow_print? ──no──► NotAllowed
//!                        │yes
//!                        ▼
//!                 link offline? ──yes──► PrinterOffline
//!                        │no
//!                        ▼
//!                  in flight? ──yes──► AlreadyPending
//!                        │no
//!                        ▼
//!                  fired before? ──yes──► AlreadyPrinted
//!                        │no
//!                        ▼
//!             sink.print(payload) within timeout
//!                 ├─ ack      ──► Printed
//!                 ├─ error    ──► Failed
//!                 └─ elapsed  ──► TimedOut
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use wv_retry::{RetryPhase, RetryPolicy, RetryTracker};
use wv_schemas::{Header, HeaderId, LineId, WeightLine};

use crate::{PrintPayload, PrintSink};

/// Default wait for the print-complete acknowledgement.
pub const DEFAULT_PRINT_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one gate decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PrintOutcome {
    NotAllowed,
    Printed,
    TimedOut { after_ms: u64 },
    Failed { message: String },
    AlreadyPending,
    AlreadyPrinted,
    PrinterOffline,
}

impl PrintOutcome {
    /// `true` when the sink was invoked and did not acknowledge.
    pub fn is_failure(&self) -> bool {
        matches!(self, PrintOutcome::TimedOut { .. } | PrintOutcome::Failed { .. })
    }
}

type PrintKey = (LineId, u32);

#[derive(Debug)]
struct GateState {
    pending: HashSet<PrintKey>,
    /// Started cycles, with the header each line belongs to.
    fired: HashMap<PrintKey, HeaderId>,
    link: RetryTracker,
}

/// Gate owning the print side effect.
pub struct PrintGate {
    sink: Arc<dyn PrintSink>,
    timeout: Duration,
    state: Arc<Mutex<GateState>>,
}

impl PrintGate {
    pub fn new(sink: Arc<dyn PrintSink>, timeout: Duration, link_policy: RetryPolicy) -> Self {
        Self {
            sink,
            timeout,
            state: Arc::new(Mutex::new(GateState {
                pending: HashSet::new(),
                fired: HashMap::new(),
                link: RetryTracker::new(link_policy),
            })),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Print the label for a freshly committed or corrected line, once.
    pub async fn maybe_print(&self, line: &WeightLine, header: &Header) -> PrintOutcome {
        self.run(line, header, false).await
    }

    /// Operator-requested reprint from history.
    ///
    /// Bypasses the once-per-revision record but still honours `allow_print`,
    /// the in-flight guard and an offline print link.
    pub async fn reprint(&self, line: &WeightLine, header: &Header) -> PrintOutcome {
        self.run(line, header, true).await
    }

    pub fn link_phase(&self) -> RetryPhase {
        self.lock().link.phase()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().link.state().last_error.clone()
    }

    /// Whether a cycle for this revision has already been started.
    pub fn has_fired(&self, line: &WeightLine) -> bool {
        self.lock().fired.contains_key(&(line.id, line.revision))
    }

    /// Drop the once-per-revision record of every other header's lines.
    pub fn retain_header(&self, header_id: HeaderId) {
        let mut st = self.lock();
        let before = st.fired.len();
        st.fired.retain(|_, h| *h == header_id);
        debug!(header_id, dropped = before - st.fired.len(), "print records pruned");
    }

    /// Bring an offline print channel back.
    pub fn reset_link(&self) {
        self.lock().link.manual_retry();
        info!("print link reset");
    }

    async fn run(&self, line: &WeightLine, header: &Header, reprint: bool) -> PrintOutcome {
        if !header.allow_print {
            return PrintOutcome::NotAllowed;
        }

        let key = (line.id, line.revision);
        {
            let mut st = self.lock();
            if st.link.is_offline() {
                return PrintOutcome::PrinterOffline;
            }
            if st.pending.contains(&key) {
                return PrintOutcome::AlreadyPending;
            }
            if !reprint && st.fired.contains_key(&key) {
                return PrintOutcome::AlreadyPrinted;
            }
            // Marked fired before the sink call so a dropped future can never
            // lead to a second invocation.
            st.pending.insert(key);
            st.fired.insert(key, line.header_id);
        }
        let _pending = PendingGuard {
            state: Arc::clone(&self.state),
            key,
        };

        let payload = PrintPayload::for_line(line, header, Utc::now());
        let outcome = match tokio::time::timeout(self.timeout, self.sink.print(payload)).await {
            Ok(Ok(())) => PrintOutcome::Printed,
            Ok(Err(e)) => PrintOutcome::Failed {
                message: e.to_string(),
            },
            Err(_) => PrintOutcome::TimedOut {
                after_ms: self.timeout.as_millis() as u64,
            },
        };

        let mut st = self.lock();
        match &outcome {
            PrintOutcome::Printed => {
                st.link.record_success();
                info!(serial = %line.serial, line_id = line.id, revision = line.revision, reprint, "label printed");
            }
            PrintOutcome::Failed { message } => {
                st.link.record_failure(message.clone(), Instant::now());
                warn!(serial = %line.serial, line_id = line.id, error = %message, phase = ?st.link.phase(), "label print failed");
            }
            PrintOutcome::TimedOut { after_ms } => {
                st.link
                    .record_failure(format!("no print acknowledgement after {after_ms} ms"), Instant::now());
                warn!(serial = %line.serial, line_id = line.id, after_ms, phase = ?st.link.phase(), "label print timed out");
            }
            _ => {}
        }
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight marker however the print future ends.
struct PendingGuard {
    state: Arc<Mutex<GateState>>,
    key: PrintKey,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.pending.remove(&self.key);
    }
}
