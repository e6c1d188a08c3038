//! Scenario: print gating by header flag
//!
//! # Invariants under test
//!
//! 1. A header with `allow_print = false` never reaches the sink, however many
//!    times the gate is asked.
//! 2. A header with `allow_print = true` prints exactly once per line, and the
//!    payload carries the line's serial and carton number.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use wv_print::{PrintError, PrintGate, PrintOutcome, PrintPayload, PrintSink};
use wv_retry::RetryPolicy;
use wv_schemas::{Header, LineStatus, OrderMetadata, WeightLine};

#[derive(Default)]
struct Capture {
    payloads: Mutex<Vec<PrintPayload>>,
}

#[async_trait::async_trait]
impl PrintSink for Capture {
    async fn print(&self, payload: PrintPayload) -> Result<(), PrintError> {
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}

fn header(allow_print: bool) -> Header {
    Header {
        id: 4,
        standard_weight: Some(5.0),
        tolerance: None,
        allow_print,
        order: OrderMetadata {
            job_no: Some("JOB-88".into()),
            ..OrderMetadata::default()
        },
    }
}

fn line() -> WeightLine {
    WeightLine {
        id: 90,
        header_id: 4,
        serial: "VC-000090".into(),
        gross_weight: 5.02,
        recorded_at: Utc::now(),
        status: LineStatus::Valid,
        remark: Some("first carton".into()),
        index_no: 3,
        corrected_weight: None,
        revision: 0,
    }
}

fn gate(sink: Arc<Capture>) -> PrintGate {
    PrintGate::new(sink, Duration::from_secs(5), RetryPolicy::default())
}

#[tokio::test]
async fn disallowed_header_never_prints() {
    let sink = Arc::new(Capture::default());
    let g = gate(sink.clone());

    for _ in 0..3 {
        assert_eq!(g.maybe_print(&line(), &header(false)).await, PrintOutcome::NotAllowed);
    }
    assert!(sink.payloads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn allowed_header_prints_exactly_once() {
    let sink = Arc::new(Capture::default());
    let g = gate(sink.clone());

    assert_eq!(g.maybe_print(&line(), &header(true)).await, PrintOutcome::Printed);
    assert_eq!(g.maybe_print(&line(), &header(true)).await, PrintOutcome::AlreadyPrinted);

    let payloads = sink.payloads.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].serial, "VC-000090");
    assert_eq!(payloads[0].index_no, 3);
    assert_eq!(payloads[0].order.job_no.as_deref(), Some("JOB-88"));
}
