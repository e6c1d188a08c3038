//! Scenario: one outstanding write per header across header switches
//!
//! # Invariants under test
//!
//! 1. Switching A -> B -> A while A's create is pending does not free A's write
//!    slot: a new submit for A is ignored as `InFlight` with no store call.
//! 2. The pending create still settles as discarded, and A accepts writes again
//!    once it has.
//! 3. A different header is not blocked by A's outstanding write.

mod common;

use common::Rig;
use wv_runtime::{IgnoreReason, SubmitOutcome};
use wv_testkit::{header, PrintMode, ScriptedScale};

fn two_headers() -> Rig {
    Rig::new(
        ScriptedScale::steady(2.5),
        vec![header(1, Some(2.5), true), header(2, Some(2.5), true)],
        PrintMode::Ack,
    )
}

#[tokio::test(start_paused = true)]
async fn reselected_header_waits_for_its_pending_create() {
    let rig = two_headers();
    rig.ctl.select_header(1).await.unwrap();
    rig.wait_decided().await;

    rig.store.hold_writes();
    let pending = {
        let ctl = rig.ctl.clone();
        tokio::spawn(async move { ctl.submit(None).await })
    };
    rig.store.write_entered().await;

    rig.ctl.select_header(2).await.unwrap();
    rig.ctl.select_header(1).await.unwrap();
    rig.wait_decided().await;

    let again = rig.ctl.submit(None).await.unwrap();
    assert_eq!(again, SubmitOutcome::Ignored(IgnoreReason::InFlight));
    assert_eq!(rig.store.creates(), 1);

    rig.store.release_one();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        SubmitOutcome::Discarded { header_id: 1 }
    );
    assert!(!rig.ctl.status().submitting);

    let next = {
        let ctl = rig.ctl.clone();
        tokio::spawn(async move { ctl.submit(None).await })
    };
    rig.store.write_entered().await;
    rig.store.release_one();
    let next = next.await.unwrap().unwrap();
    let SubmitOutcome::Committed { line, .. } = &next else {
        panic!("expected commit, got {next:?}");
    };
    assert_eq!(line.header_id, 1);
    assert_eq!(line.index_no, 2);
    assert_eq!(rig.store.creates(), 2);
}

#[tokio::test(start_paused = true)]
async fn other_header_writes_while_first_is_pending() {
    let rig = two_headers();
    rig.ctl.select_header(1).await.unwrap();
    rig.wait_decided().await;

    rig.store.hold_writes();
    let first = {
        let ctl = rig.ctl.clone();
        tokio::spawn(async move { ctl.submit(None).await })
    };
    rig.store.write_entered().await;

    rig.ctl.select_header(2).await.unwrap();
    rig.wait_decided().await;
    let second = {
        let ctl = rig.ctl.clone();
        tokio::spawn(async move { ctl.submit(None).await })
    };
    rig.store.write_entered().await;
    assert_eq!(rig.store.creates(), 2);

    rig.store.release_one();
    rig.store.release_one();
    assert_eq!(
        first.await.unwrap().unwrap(),
        SubmitOutcome::Discarded { header_id: 1 }
    );
    let second = second.await.unwrap().unwrap();
    let SubmitOutcome::Committed { line, .. } = &second else {
        panic!("expected commit, got {second:?}");
    };
    assert_eq!(line.header_id, 2);
}
