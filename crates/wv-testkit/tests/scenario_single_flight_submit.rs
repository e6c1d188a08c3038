//! Scenario: single-flight line submission
//!
//! # Invariants under test
//!
//! 1. A second submit while the first create is still pending is ignored as
//!    `InFlight` and makes no store call.
//! 2. A submit inside the debounce window after the first completes is ignored
//!    as `Debounced`.
//! 3. Exactly one line exists afterwards, with a store-assigned serial.
//! 4. A commit consumes only the reading it submitted; a newer reading polled
//!    while the create was pending can be submitted straight away.

mod common;

use common::Rig;
use wv_runtime::{IgnoreReason, SubmitOutcome};
use wv_schemas::LineStatus;
use wv_testkit::{header, PrintMode, ScriptStep, ScriptedScale};

#[tokio::test(start_paused = true)]
async fn rapid_double_submit_creates_one_line() {
    let rig = Rig::new(
        ScriptedScale::steady(2.5),
        vec![header(1, Some(2.5), true)],
        PrintMode::Ack,
    );
    rig.ctl.select_header(1).await.unwrap();
    rig.wait_decided().await;

    rig.store.hold_writes();
    let first = {
        let ctl = rig.ctl.clone();
        tokio::spawn(async move { ctl.submit(Some("first".into())).await })
    };
    rig.store.write_entered().await;
    assert!(rig.ctl.status().submitting);

    let second = rig.ctl.submit(None).await.unwrap();
    assert_eq!(second, SubmitOutcome::Ignored(IgnoreReason::InFlight));
    assert_eq!(rig.store.creates(), 1);

    rig.store.release_one();
    let first = first.await.unwrap().unwrap();
    let SubmitOutcome::Committed { line, .. } = &first else {
        panic!("expected commit, got {first:?}");
    };
    assert_eq!(line.status, LineStatus::Valid);
    assert_eq!(line.serial, "WV000100001");
    assert_eq!(line.index_no, 1);

    let third = rig.ctl.submit(None).await.unwrap();
    assert_eq!(third, SubmitOutcome::Ignored(IgnoreReason::Debounced));

    assert_eq!(rig.store.creates(), 1);
    assert_eq!(rig.store.lines().len(), 1);
    assert!(!rig.ctl.status().submitting);
}

#[tokio::test(start_paused = true)]
async fn next_carton_after_window_gets_next_index() {
    let rig = Rig::new(
        ScriptedScale::steady(2.5),
        vec![header(1, Some(2.5), false)],
        PrintMode::Ack,
    );
    rig.ctl.select_header(1).await.unwrap();
    rig.wait_decided().await;

    assert!(matches!(
        rig.ctl.submit(None).await.unwrap(),
        SubmitOutcome::Committed { .. }
    ));

    // The committed reading is consumed; the next carton needs a fresh read.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    rig.wait_decided().await;

    let SubmitOutcome::Committed { line, .. } = rig.ctl.submit(None).await.unwrap() else {
        panic!("second carton not committed");
    };
    assert_eq!(line.index_no, 2);
    assert_eq!(rig.store.creates(), 2);
}

#[tokio::test(start_paused = true)]
async fn reading_polled_during_create_survives_commit() {
    let rig = Rig::new(
        ScriptedScale::steady(2.5),
        vec![header(1, Some(2.5), false)],
        PrintMode::Ack,
    );
    rig.ctl.select_header(1).await.unwrap();
    rig.wait_decided().await;

    rig.store.hold_writes();
    let first = {
        let ctl = rig.ctl.clone();
        tokio::spawn(async move { ctl.submit(None).await })
    };
    rig.store.write_entered().await;

    // A new carton lands on the scale while the create is pending, then the
    // bridge goes quiet so no later poll can refill the form.
    rig.scale.set_fallback(ScriptStep::Weight(2.55));
    rig.wait_until(|s| s.verdict.weight == Some(2.55)).await;
    rig.scale.set_fallback(ScriptStep::Hang);

    rig.store.release_one();
    let SubmitOutcome::Committed { line, .. } = first.await.unwrap().unwrap() else {
        panic!("first carton not committed");
    };
    assert_eq!(line.gross_weight, 2.5);

    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    let second = {
        let ctl = rig.ctl.clone();
        tokio::spawn(async move { ctl.submit(None).await })
    };
    rig.store.write_entered().await;
    rig.store.release_one();

    let second = second.await.unwrap().unwrap();
    let SubmitOutcome::Committed { line, .. } = &second else {
        panic!("expected commit, got {second:?}");
    };
    assert_eq!(line.gross_weight, 2.55);
    assert_eq!(line.index_no, 2);
    assert_eq!(rig.store.creates(), 2);
}
