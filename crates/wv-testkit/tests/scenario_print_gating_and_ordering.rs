//! Scenario: print gating and persistence-before-print
//!
//! # Invariants under test
//!
//! 1. A header with `allow_print = false` still gets its line persisted with
//!    the verdict's status, and the print sink is never called.
//! 2. On the accepted path the create resolves before the sink is invoked.
//! 3. A print that never acknowledges times out without a second create.
//! 4. A rejected reading is persisted as `invalid` and still printed when
//!    printing is allowed.

mod common;

use std::time::Duration;

use common::Rig;
use wv_print::PrintOutcome;
use wv_runtime::SubmitOutcome;
use wv_schemas::LineStatus;
use wv_testkit::{header, PrintMode, ScriptedScale};

#[tokio::test(start_paused = true)]
async fn disallowed_header_persists_but_never_prints() {
    let rig = Rig::new(
        ScriptedScale::steady(2.5),
        vec![header(1, Some(2.5), false)],
        PrintMode::Ack,
    );
    rig.ctl.select_header(1).await.unwrap();
    assert!(!rig.ctl.status().printing_allowed);
    rig.wait_decided().await;

    let outcome = rig.ctl.submit(None).await.unwrap();
    let SubmitOutcome::Committed { line, print } = outcome else {
        panic!("expected commit");
    };
    assert_eq!(line.status, LineStatus::Valid);
    assert_eq!(print, PrintOutcome::NotAllowed);
    assert_eq!(rig.sink.calls(), 0);
    assert_eq!(rig.log.entries(), vec!["create:WV000100001".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn create_resolves_before_print_and_timeout_never_recreates() {
    let rig = Rig::new(
        ScriptedScale::steady(2.5),
        vec![header(1, Some(2.5), true)],
        PrintMode::NeverAck,
    );
    rig.ctl.select_header(1).await.unwrap();
    rig.wait_decided().await;

    let outcome = rig.ctl.submit(None).await.unwrap();
    let SubmitOutcome::Committed { line, print } = outcome else {
        panic!("expected commit");
    };
    assert_eq!(print, PrintOutcome::TimedOut { after_ms: 5000 });
    assert_eq!(
        rig.log.entries(),
        vec![format!("create:{}", line.serial), format!("print:{}", line.serial)]
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(rig.store.creates(), 1);
    assert_eq!(rig.sink.calls(), 1);

    let status = rig.ctl.status();
    assert_eq!(status.last_line.map(|l| l.id), Some(line.id));
    assert_eq!(status.last_print, Some(PrintOutcome::TimedOut { after_ms: 5000 }));
}

#[tokio::test(start_paused = true)]
async fn rejected_reading_is_persisted_invalid_and_printed() {
    let rig = Rig::new(
        ScriptedScale::steady(2.61),
        vec![header(1, Some(2.5), true)],
        PrintMode::Ack,
    );
    rig.ctl.select_header(1).await.unwrap();
    rig.wait_decided().await;

    let SubmitOutcome::Committed { line, print } = rig.ctl.submit(None).await.unwrap() else {
        panic!("expected commit");
    };
    assert_eq!(line.status, LineStatus::Invalid);
    assert_eq!(print, PrintOutcome::Printed);

    let payloads = rig.sink.payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].status, LineStatus::Invalid);
    assert_eq!(payloads[0].order.contract_no.as_deref(), Some("CT-1"));
}
