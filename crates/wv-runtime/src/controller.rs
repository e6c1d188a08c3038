//! ReconciliationController: one station, one selected header at a time.
//!
//! # Invariants
//!
//! 1. At most one scale read is in flight, and only the task of the current
//!    session generation may apply its result.
//! 2. At most one `LineStore::create`/`update` is in flight per header, across
//!    header switches. A trigger while one is running, or inside the debounce
//!    window of the previous accepted trigger, is ignored without a store call.
//! 3. A line is persisted before its label is printed. A print failure never
//!    causes a second create.
//! 4. `select_header` bumps the generation. Anything started under an older
//!    generation (poll result, submit response, form reset) is dropped.
//! 5. After `max_attempts` consecutive read failures the link is `Offline` and
//!    the poll task ends. Only `retry()` or a header switch restarts it.
//!
//! ```text
//!   select_header ──► gen += 1 ──► spawn poll(gen)
//!                                      │
//!          ┌───────────── read ◄───────┘
//!          │ ok: verdict = evaluate(..) ; sleep(poll_interval)
//!          │ err: tracker.record_failure
//!          │        ├─ RetryAfter(d) ──► sleep(d), read again
//!          │        └─ GiveUp ─────────► Offline, task ends
//!          ▼
//!   submit ──► guard ──► create ──► gen unchanged? ──► print ──► reset after delay
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant as StdInstant;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wv_audit::{
    AuditWriter, EV_LINE_COMMITTED, EV_LINE_CORRECTED, EV_PRINT_FINISHED, EV_SCALE_OFFLINE,
    EV_SESSION_SELECTED, TOPIC_STATION,
};
use wv_config::StationConfig;
use wv_print::{PrintGate, PrintOutcome};
use wv_retry::{RetryDecision, RetryTracker};
use wv_scale::{ReadError, WeightSource};
use wv_schemas::{
    Header, HeaderId, LineCorrection, LineStatus, NewLine, Verdict, WeightLine, WeightReading,
};
use wv_store::{HeaderStore, LineHistory, LineStore, StoreError};

use crate::{IgnoreReason, StationEvent, StationStatus, SubmitError, SubmitOutcome};

const BUS_CAPACITY: usize = 256;

/// External collaborators, injected explicitly.
#[derive(Clone)]
pub struct Collaborators {
    pub scale: Arc<dyn WeightSource>,
    pub lines: Arc<dyn LineStore>,
    pub headers: Arc<dyn HeaderStore>,
    pub printer: Arc<PrintGate>,
}

/// Cloneable handle; all clones drive the same station.
#[derive(Clone)]
pub struct ReconciliationController {
    inner: Arc<Inner>,
}

struct Inner {
    collab: Collaborators,
    config: StationConfig,
    status_tx: watch::Sender<StationStatus>,
    bus: broadcast::Sender<StationEvent>,
    session: Mutex<Session>,
    audit: Option<Mutex<AuditWriter>>,
}

struct Session {
    generation: u64,
    session_id: Uuid,
    header: Option<Header>,
    tracker: RetryTracker,
    /// Latest reading and its verdict, if not yet consumed by a commit.
    current: Option<(WeightReading, Verdict)>,
    last_weight: Option<f64>,
    /// Headers with a store write outstanding. Survives header switches.
    writing: HashSet<HeaderId>,
    last_trigger: Option<Instant>,
    poll: Option<JoinHandle<()>>,
    reset: Option<JoinHandle<()>>,
}

impl Session {
    fn stop_tasks(&mut self) {
        if let Some(h) = self.poll.take() {
            h.abort();
        }
        if let Some(h) = self.reset.take() {
            h.abort();
        }
    }
}

/// What a single action will write, captured under the lock.
struct Ticket {
    generation: u64,
    session_id: Uuid,
    header: Header,
    reading: WeightReading,
    verdict: Verdict,
}

/// Collects everything a controller owns before the shared handle exists.
pub struct ControllerBuilder {
    collab: Collaborators,
    config: StationConfig,
    audit: Option<AuditWriter>,
}

impl ControllerBuilder {
    /// Write station events to `writer`.
    pub fn audit(mut self, writer: AuditWriter) -> Self {
        self.audit = Some(writer);
        self
    }

    pub fn build(self) -> ReconciliationController {
        let (status_tx, _) = watch::channel(StationStatus::idle());
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        let tracker = RetryTracker::new(self.config.scale.retry);
        ReconciliationController {
            inner: Arc::new(Inner {
                collab: self.collab,
                config: self.config,
                status_tx,
                bus,
                session: Mutex::new(Session {
                    generation: 0,
                    session_id: Uuid::nil(),
                    header: None,
                    tracker,
                    current: None,
                    last_weight: None,
                    writing: HashSet::new(),
                    last_trigger: None,
                    poll: None,
                    reset: None,
                }),
                audit: self.audit.map(Mutex::new),
            }),
        }
    }
}

impl ReconciliationController {
    pub fn builder(collab: Collaborators, config: StationConfig) -> ControllerBuilder {
        ControllerBuilder {
            collab,
            config,
            audit: None,
        }
    }

    /// Controller without an audit trail.
    pub fn new(collab: Collaborators, config: StationConfig) -> Self {
        Self::builder(collab, config).build()
    }

    pub fn config(&self) -> &StationConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> watch::Receiver<StationStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<StationEvent> {
        self.inner.bus.subscribe()
    }

    pub fn status(&self) -> StationStatus {
        self.inner.status_tx.borrow().clone()
    }

    pub fn selected_header(&self) -> Option<Header> {
        self.inner.lock().header.clone()
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Switch to `header_id` and start polling for it.
    ///
    /// On lookup failure the previous session keeps running.
    pub async fn select_header(&self, header_id: HeaderId) -> Result<Header, StoreError> {
        let header = self.inner.collab.headers.get(header_id).await?;

        let (generation, session_id) = {
            let mut s = self.inner.lock();
            s.stop_tasks();
            s.generation += 1;
            s.session_id = Uuid::new_v4();
            s.header = Some(header.clone());
            s.tracker.manual_retry();
            s.current = None;
            s.last_weight = None;
            s.last_trigger = None;
            (s.generation, s.session_id)
        };
        self.inner.collab.printer.retain_header(header.id);

        let print_link = self.inner.collab.printer.link_phase();
        self.inner.publish(|st| {
            *st = StationStatus {
                header_id: Some(header.id),
                session_id: Some(session_id),
                polling: true,
                printing_allowed: header.allow_print,
                print_link,
                ..StationStatus::idle()
            };
        });
        self.inner.emit(StationEvent::SessionSelected {
            header_id: header.id,
            session_id,
        });
        self.inner.audit(
            session_id,
            EV_SESSION_SELECTED,
            json!({
                "header_id": header.id,
                "standard_weight": header.standard_weight,
                "tolerance": header.effective_band(self.inner.config.tolerance),
                "allow_print": header.allow_print,
            }),
        );
        info!(header_id = header.id, generation, "session selected");
        self.inner.start_polling(generation);
        Ok(header)
    }

    /// Operator retry: counter to zero, error cleared, verdict pending,
    /// polling restarted. Returns `false` when no header is selected.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn retry(&self) -> bool {
        let generation = {
            let mut s = self.inner.lock();
            if s.header.is_none() {
                return false;
            }
            if let Some(h) = s.poll.take() {
                h.abort();
            }
            s.tracker.manual_retry();
            s.current = None;
            s.generation
        };
        self.inner.publish(|st| {
            st.link = wv_retry::RetryPhase::Idle;
            st.last_error = None;
            st.verdict = Verdict::pending(Utc::now());
            st.polling = true;
        });
        info!("scale link manual retry");
        self.inner.start_polling(generation);
        true
    }

    /// Stop polling and any pending form reset. The session stays selected.
    pub fn shutdown(&self) {
        self.inner.lock().stop_tasks();
        self.inner.publish(|st| st.polling = false);
        info!("station controller stopped");
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist the current verified reading as a new line, then print it.
    pub async fn submit(&self, remark: Option<String>) -> Result<SubmitOutcome, SubmitError> {
        let ticket = match self.inner.begin(&remark)? {
            Ok(t) => t,
            Err(reason) => return Ok(SubmitOutcome::Ignored(reason)),
        };
        let _guard = InFlightGuard::new(&self.inner, &ticket);

        let status = ticket.verdict.line_status().unwrap_or(LineStatus::Invalid);
        let new_line = NewLine {
            gross_weight: ticket.reading.weight,
            recorded_at: Utc::now(),
            status,
            remark: remark.clone(),
        };
        debug!(header_id = ticket.header.id, weight = new_line.gross_weight, status = status.as_str(), "creating line");
        let result = self.inner.collab.lines.create(ticket.header.id, new_line).await;

        let line = match self.inner.settle(&ticket, result)? {
            Some(line) => line,
            None => {
                return Ok(SubmitOutcome::Discarded {
                    header_id: ticket.header.id,
                })
            }
        };

        info!(header_id = line.header_id, serial = %line.serial, index_no = line.index_no, status = line.status.as_str(), "line committed");
        self.inner.emit(StationEvent::LineCommitted { line: line.clone() });
        self.inner.audit(
            ticket.session_id,
            EV_LINE_COMMITTED,
            json!({
                "line_id": line.id,
                "serial": line.serial,
                "index_no": line.index_no,
                "gross_weight": line.gross_weight,
                "status": line.status,
                "remark": line.remark,
                "verdict": ticket.verdict.kind,
            }),
        );

        let print = self.inner.print(&ticket, &line).await;
        self.inner.schedule_reset(ticket.generation);
        Ok(SubmitOutcome::Committed { line, print })
    }

    /// Correct an existing line of the selected header with the current
    /// verified reading: `valid` when accepted, `cancelled` otherwise.
    pub async fn reweigh(
        &self,
        line: &WeightLine,
        remark: Option<String>,
    ) -> Result<SubmitOutcome, SubmitError> {
        {
            let s = self.inner.lock();
            let header = s.header.as_ref().ok_or(SubmitError::NoHeader)?;
            if line.header_id != header.id {
                return Err(SubmitError::WrongHeader {
                    line_id: line.id,
                    line_header: line.header_id,
                    selected: header.id,
                });
            }
        }
        if !line.status.is_correctable() {
            return Err(SubmitError::NotCorrectable {
                line_id: line.id,
                status: line.status,
            });
        }

        let ticket = match self.inner.begin(&remark)? {
            Ok(t) => t,
            Err(reason) => return Ok(SubmitOutcome::Ignored(reason)),
        };
        let _guard = InFlightGuard::new(&self.inner, &ticket);

        let status = if ticket.verdict.is_accepted() {
            LineStatus::Valid
        } else {
            LineStatus::Cancelled
        };
        let correction = LineCorrection {
            line_id: line.id,
            status,
            corrected_weight: ticket.reading.weight,
            remark,
        };
        let result = self.inner.collab.lines.update(correction).await;

        let corrected = match self.inner.settle(&ticket, result)? {
            Some(l) => l,
            None => {
                return Ok(SubmitOutcome::Discarded {
                    header_id: ticket.header.id,
                })
            }
        };

        info!(serial = %corrected.serial, revision = corrected.revision, status = corrected.status.as_str(), "line corrected");
        self.inner.emit(StationEvent::LineCorrected {
            line: corrected.clone(),
        });
        self.inner.audit(
            ticket.session_id,
            EV_LINE_CORRECTED,
            json!({
                "line_id": corrected.id,
                "serial": corrected.serial,
                "revision": corrected.revision,
                "previous_status": line.status,
                "status": corrected.status,
                "gross_weight": corrected.gross_weight,
                "corrected_weight": corrected.corrected_weight,
                "remark": corrected.remark,
            }),
        );

        let print = self.inner.print(&ticket, &corrected).await;
        self.inner.schedule_reset(ticket.generation);
        Ok(SubmitOutcome::Corrected {
            line: corrected,
            print,
        })
    }

    // -----------------------------------------------------------------------
    // Reads and operator actions
    // -----------------------------------------------------------------------

    /// Lines of the selected header, newest first.
    pub async fn history(&self) -> Result<LineHistory, SubmitError> {
        let header_id = self.inner.lock().header.as_ref().map(|h| h.id);
        let header_id = header_id.ok_or(SubmitError::NoHeader)?;
        let lines = self.inner.collab.lines.list_by_header(header_id).await?;
        Ok(LineHistory::from_lines(lines))
    }

    /// Print a line of the selected header again, on operator request.
    pub async fn reprint(&self, line: &WeightLine) -> Result<PrintOutcome, SubmitError> {
        let header = self.inner.lock().header.clone().ok_or(SubmitError::NoHeader)?;
        if line.header_id != header.id {
            return Err(SubmitError::WrongHeader {
                line_id: line.id,
                line_header: line.header_id,
                selected: header.id,
            });
        }
        let outcome = self.inner.collab.printer.reprint(line, &header).await;
        let print_link = self.inner.collab.printer.link_phase();
        self.inner.publish(|st| {
            st.print_link = print_link;
            st.last_print = Some(outcome.clone());
        });
        Ok(outcome)
    }

    pub fn reset_print_link(&self) {
        self.inner.collab.printer.reset_link();
        let print_link = self.inner.collab.printer.link_phase();
        self.inner.publish(|st| st.print_link = print_link);
    }
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, f: impl FnOnce(&mut StationStatus)) {
        self.status_tx.send_modify(f);
    }

    fn emit(&self, ev: StationEvent) {
        // No subscribers is fine.
        let _ = self.bus.send(ev);
    }

    fn audit(&self, session_id: Uuid, event_type: &str, payload: Value) {
        let Some(audit) = &self.audit else {
            return;
        };
        let mut w = audit.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = w.append(session_id, TOPIC_STATION, event_type, payload) {
            warn!(event_type, error = %format!("{e:#}"), "audit append failed");
        }
    }

    /// Guard checks and validation for a write. The outer `Result` is a
    /// refusal, the inner `Err` an ignored trigger.
    fn begin(&self, remark: &Option<String>) -> Result<Result<Ticket, IgnoreReason>, SubmitError> {
        let now = Instant::now();
        let ticket = {
            let mut s = self.lock();
            let header = s.header.clone().ok_or(SubmitError::NoHeader)?;
            if s.writing.contains(&header.id) {
                return Ok(Err(IgnoreReason::InFlight));
            }
            if let Some(prev) = s.last_trigger {
                if now.duration_since(prev) < self.config.submit.debounce {
                    return Ok(Err(IgnoreReason::Debounced));
                }
            }

            if header.usable_standard_weight().is_none() {
                return Err(SubmitError::NoStandardWeight {
                    header_id: header.id,
                });
            }
            let (reading, verdict) = s
                .current
                .filter(|(_, v)| v.is_decided())
                .ok_or(SubmitError::NotVerified)?;

            s.writing.insert(header.id);
            s.last_trigger = Some(now);
            Ticket {
                generation: s.generation,
                session_id: s.session_id,
                header,
                reading,
                verdict,
            }
        };

        self.publish(|st| {
            st.submitting = true;
            st.remark = remark.clone();
        });
        Ok(Ok(ticket))
    }

    /// Apply a store response. `Ok(None)` means the session moved on and the
    /// response was discarded.
    fn settle(
        &self,
        ticket: &Ticket,
        result: Result<WeightLine, StoreError>,
    ) -> Result<Option<WeightLine>, SubmitError> {
        {
            let mut s = self.lock();
            if s.generation != ticket.generation {
                drop(s);
                match &result {
                    Ok(line) => info!(header_id = ticket.header.id, serial = %line.serial, "store response after header switch discarded"),
                    Err(e) => info!(header_id = ticket.header.id, error = %e, "store error after header switch discarded"),
                }
                self.emit(StationEvent::SubmitDiscarded {
                    header_id: ticket.header.id,
                });
                return Ok(None);
            }
            // The submitted reading is consumed; a newer one polled meanwhile
            // stays available.
            if result.is_ok() && s.current.map(|(r, _)| r) == Some(ticket.reading) {
                s.current = None;
            }
        }

        match result {
            Ok(line) => {
                self.publish(|st| {
                    st.last_line = Some(line.clone());
                    st.last_error = None;
                });
                Ok(Some(line))
            }
            Err(e) => {
                warn!(header_id = ticket.header.id, status = ?e.status, error = %e, "store write failed");
                self.publish(|st| {
                    st.submitting = false;
                    st.last_error = Some(e.message.clone());
                });
                self.emit(StationEvent::SubmitFailed {
                    message: e.message.clone(),
                });
                Err(SubmitError::Store(e))
            }
        }
    }

    async fn print(&self, ticket: &Ticket, line: &WeightLine) -> PrintOutcome {
        let printer = &self.collab.printer;
        let outcome = printer.maybe_print(line, &ticket.header).await;
        let print_link = printer.link_phase();

        if self.lock().generation == ticket.generation {
            self.publish(|st| {
                st.print_link = print_link;
                st.last_print = Some(outcome.clone());
            });
        }
        if outcome != PrintOutcome::NotAllowed {
            self.emit(StationEvent::PrintFinished {
                line_id: line.id,
                revision: line.revision,
                outcome: outcome.clone(),
            });
            self.audit(
                ticket.session_id,
                EV_PRINT_FINISHED,
                json!({
                    "line_id": line.id,
                    "serial": line.serial,
                    "revision": line.revision,
                    "outcome": outcome,
                }),
            );
        }
        outcome
    }

    /// Spawn the poll task unless the session moved on meanwhile.
    fn start_polling(self: &Arc<Self>, generation: u64) {
        let mut s = self.lock();
        if s.generation != generation {
            return;
        }
        if let Some(prev) = s.poll.replace(spawn_poll(self, generation)) {
            prev.abort();
        }
    }

    fn schedule_reset(self: &Arc<Self>, generation: u64) {
        let delay = self.config.submit.reset_delay;
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.reset_form(generation);
            }
        });

        let mut s = self.lock();
        if s.generation != generation {
            handle.abort();
            return;
        }
        if let Some(prev) = s.reset.replace(handle) {
            prev.abort();
        }
    }

    fn reset_form(&self, generation: u64) {
        let awaiting_reading = {
            let mut s = self.lock();
            if s.generation != generation {
                return;
            }
            s.reset = None;
            s.current.is_none()
        };
        self.publish(|st| {
            st.remark = None;
            if awaiting_reading {
                st.verdict = Verdict::pending(Utc::now());
            }
        });
        self.emit(StationEvent::FormReset);
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Apply one read outcome. Returns the delay before the next read, or
    /// `None` when the task must stop.
    fn apply_read(
        &self,
        generation: u64,
        result: Result<WeightReading, ReadError>,
    ) -> Option<std::time::Duration> {
        let mut s = self.lock();
        if s.generation != generation {
            return None;
        }
        let header = s.header.clone()?;

        match result {
            Ok(reading) => {
                let was_failing = s.tracker.state().attempts > 0;
                s.tracker.record_success();
                let band = header.effective_band(self.config.tolerance);
                let verdict =
                    wv_tolerance::evaluate(&reading, header.usable_standard_weight(), &band);
                s.current = Some((reading, verdict));
                s.last_weight = Some(reading.weight);
                drop(s);

                self.publish(|st| {
                    st.verdict = verdict;
                    st.link = wv_retry::RetryPhase::Idle;
                    if was_failing {
                        st.last_error = None;
                    }
                });
                self.emit(StationEvent::Reading { verdict });
                if was_failing {
                    info!(header_id = header.id, "scale link recovered");
                    self.emit(StationEvent::LinkChanged {
                        phase: wv_retry::RetryPhase::Idle,
                        error: None,
                    });
                }
                Some(self.config.scale.poll_interval)
            }
            Err(e) => {
                let msg = e.to_string();
                let decision = s.tracker.record_failure(msg.clone(), StdInstant::now());
                let phase = s.tracker.phase();
                let attempts = s.tracker.state().attempts;
                match decision {
                    RetryDecision::RetryAfter(delay) => {
                        drop(s);
                        warn!(header_id = header.id, attempt = attempts, error = %msg, "scale read failed, retrying");
                        self.publish(|st| {
                            st.link = phase;
                            st.last_error = Some(msg.clone());
                        });
                        self.emit(StationEvent::LinkChanged {
                            phase,
                            error: Some(msg),
                        });
                        Some(delay)
                    }
                    RetryDecision::GiveUp => {
                        s.current = None;
                        s.poll = None;
                        let last_weight = s.last_weight;
                        let session_id = s.session_id;
                        drop(s);

                        warn!(header_id = header.id, attempts, error = %msg, "scale offline, polling stopped");
                        self.publish(|st| {
                            st.link = phase;
                            st.last_error = Some(msg.clone());
                            st.verdict = Verdict::offline(last_weight, Utc::now());
                            st.polling = false;
                        });
                        self.emit(StationEvent::ScaleOffline {
                            attempts,
                            error: Some(msg.clone()),
                        });
                        self.audit(
                            session_id,
                            EV_SCALE_OFFLINE,
                            json!({
                                "header_id": header.id,
                                "attempts": attempts,
                                "error": msg,
                            }),
                        );
                        None
                    }
                }
            }
        }
    }
}

fn spawn_poll(inner: &Arc<Inner>, generation: u64) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let source = Arc::clone(&inner.collab.scale);
    let timeout = inner.config.scale.read_timeout;
    tokio::spawn(async move {
        debug!(source = source.name(), generation, "poll task started");
        loop {
            let result = match tokio::time::timeout(timeout, source.read()).await {
                Ok(r) => r,
                Err(_) => Err(ReadError::Timeout {
                    after_ms: timeout.as_millis() as u64,
                }),
            };
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let Some(delay) = inner.apply_read(generation, result) else {
                debug!(generation, "poll task finished");
                return;
            };
            drop(inner);
            tokio::time::sleep(delay).await;
        }
    })
}

/// Releases the header's write slot however the write future ends. The
/// `submitting` flag is only touched while the session is unchanged.
struct InFlightGuard {
    inner: Arc<Inner>,
    header_id: HeaderId,
    generation: u64,
}

impl InFlightGuard {
    fn new(inner: &Arc<Inner>, ticket: &Ticket) -> Self {
        Self {
            inner: Arc::clone(inner),
            header_id: ticket.header.id,
            generation: ticket.generation,
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let same_session = {
            let mut s = self.inner.lock();
            s.writing.remove(&self.header_id);
            s.generation == self.generation
        };
        if same_session {
            self.inner.publish(|st| st.submitting = false);
        }
    }
}
