use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use wv_print::{PrintError, PrintPayload, PrintSink};

use crate::CallLog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintMode {
    /// Acknowledge immediately.
    Ack,
    /// Never acknowledge; the gate's timeout applies.
    NeverAck,
    Fail(String),
}

/// Print sink that records every payload it receives.
#[derive(Debug)]
pub struct RecordingPrintSink {
    mode: Mutex<PrintMode>,
    calls: AtomicUsize,
    payloads: Mutex<Vec<PrintPayload>>,
    log: Option<CallLog>,
}

impl RecordingPrintSink {
    pub fn new(mode: PrintMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            log: None,
        }
    }

    pub fn with_log(mode: PrintMode, log: CallLog) -> Self {
        Self {
            log: Some(log),
            ..Self::new(mode)
        }
    }

    pub fn set_mode(&self, mode: PrintMode) {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<PrintPayload> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl PrintSink for RecordingPrintSink {
    async fn print(&self, payload: PrintPayload) -> Result<(), PrintError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.push(format!("print:{}", payload.serial));
        }
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload);

        let mode = self.mode.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match mode {
            PrintMode::Ack => Ok(()),
            PrintMode::NeverAck => std::future::pending().await,
            PrintMode::Fail(msg) => Err(PrintError::Device(msg)),
        }
    }
}
