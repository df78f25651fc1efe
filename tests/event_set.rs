//! End-to-end scenarios for event sets driven by a scripted runtime.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use eventset::constants::{WAIT_FOREVER, WAIT_NONE};
use eventset::test_utils::ScriptedRuntime;
use eventset::{AppSite, DiagFrame, DiagStack, Error, EventSet, OpStatus, OpToken, RuntimeFault};

fn new_set() -> EventSet<ScriptedRuntime> {
    EventSet::new(ScriptedRuntime::new())
}

fn append_scripted(set: &mut EventSet<ScriptedRuntime>, script: &[OpStatus]) -> OpToken {
    let stack = DiagStack {
        frames: vec![DiagFrame {
            file: "backend.rs".into(),
            func: "complete".into(),
            line: 1,
            desc: "operation failed".into(),
        }],
    };
    let token = set.runtime_mut().mint_with_stack(script, stack);
    let rec = eventset::OpRecord::new(
        "object_write",
        "(obj=1, len=4096)",
        AppSite::new("app.rs", "flush", 21),
        "2.3.1",
        token,
    );
    set.append(rec).unwrap();
    token
}

// ==================== Literal Scenarios ====================

#[test]
fn s1_happy_path() {
    let mut set = new_set();
    for _ in 0..3 {
        append_scripted(&mut set, &[OpStatus::Succeed]);
    }

    let status = set.wait(10_000_000_000).unwrap();
    assert_eq!(status.in_progress, 0);
    assert!(!status.op_failed);

    assert_eq!(set.count(), 0);
    assert_eq!(set.err_count(), 0);
    assert!(!set.err_status());

    let runtime = set.close().unwrap();
    assert_eq!(runtime.outstanding(), 0);
    runtime.assert_all_released_once();
}

#[test]
fn s2_fast_fail_mid_stream() {
    let mut set = new_set();
    append_scripted(&mut set, &[OpStatus::InProgress, OpStatus::Succeed]); // A
    append_scripted(&mut set, &[OpStatus::Fail]); // B
    append_scripted(&mut set, &[OpStatus::InProgress, OpStatus::Succeed]); // C
    append_scripted(&mut set, &[OpStatus::InProgress, OpStatus::Succeed]); // D

    let status = set.wait(10_000_000_000).unwrap();
    assert!(status.op_failed);
    // B left the active list; the other three were still in progress when
    // the engine fast-failed at the end of the sweep.
    assert_eq!(status.in_progress, 3);

    assert_eq!(set.err_count(), 1);
    let infos = set.err_info(8).unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].counter, 1); // B was second-appended
    assert_eq!(infos[0].status, OpStatus::Fail);

    // Drive the survivors to completion and verify nothing leaked.
    let status = set.wait(WAIT_FOREVER).unwrap();
    assert_eq!(status.in_progress, 0);
    assert!(!status.op_failed);

    let runtime = set.close().unwrap();
    runtime.assert_all_released_once();
}

#[test]
fn s3_budget_exhaustion() {
    let mut set = new_set();
    let a = append_scripted(&mut set, &[OpStatus::InProgress]);
    let b = append_scripted(&mut set, &[OpStatus::InProgress]);

    let start = Instant::now();
    let status = set.wait(5_000_000).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(status.in_progress, 2);
    assert!(!status.op_failed);
    assert!(elapsed >= Duration::from_millis(5), "returned before the budget: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "overshot the budget: {elapsed:?}");

    // Let the operations finish so the set can close.
    set.runtime_mut().finish(a, OpStatus::Succeed);
    set.runtime_mut().finish(b, OpStatus::Succeed);
    set.wait(WAIT_FOREVER).unwrap();
    set.close().unwrap();
}

#[test]
fn s4_close_refusal() {
    let mut set = new_set();
    append_scripted(&mut set, &[OpStatus::InProgress, OpStatus::Succeed]);

    let (mut set, err) = set.close().unwrap_err();
    assert!(matches!(err, Error::Busy(1)));

    set.wait(WAIT_FOREVER).unwrap();
    let runtime = set.close().unwrap();
    assert_eq!(runtime.outstanding(), 0);
}

#[test]
fn s5_partial_drain_keeps_flag() {
    let mut set = new_set();
    for _ in 0..3 {
        append_scripted(&mut set, &[OpStatus::Fail]);
    }

    let status = set.wait(WAIT_FOREVER).unwrap();
    assert!(status.op_failed);
    assert_eq!(set.err_count(), 3);

    let first = set.err_info(2).unwrap();
    assert_eq!(first.len(), 2);
    assert!(set.err_status());
    assert_eq!(set.err_count(), 1);

    let second = set.err_info(1).unwrap();
    assert_eq!(second.len(), 1);
    assert!(!set.err_status());
    assert_eq!(set.err_count(), 0);

    let runtime = set.close().unwrap();
    runtime.assert_all_released_once();
}

#[test]
fn s6_counter_stability_across_failure() {
    let mut set = new_set();
    for i in 0..5 {
        let script = if i == 1 || i == 3 {
            [OpStatus::Fail]
        } else {
            [OpStatus::Succeed]
        };
        append_scripted(&mut set, &script);
    }

    let status = set.wait(WAIT_FOREVER).unwrap();
    assert!(status.op_failed);
    assert_eq!(status.in_progress, 0);

    let infos = set.err_info(8).unwrap();
    let counters: Vec<u64> = infos.iter().map(|info| info.counter).collect();
    assert_eq!(counters, vec![1, 3]);
    assert!(infos.iter().all(|info| info.status == OpStatus::Fail));

    let runtime = set.close().unwrap();
    runtime.assert_all_released_once();
}

// ==================== Wait Semantics ====================

#[test]
fn wait_none_never_blocks() {
    let mut set = new_set();
    let a = append_scripted(&mut set, &[OpStatus::InProgress]);
    let b = append_scripted(&mut set, &[OpStatus::InProgress]);

    let start = Instant::now();
    let status = set.wait(WAIT_NONE).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(status.in_progress, 2);
    assert!(elapsed < Duration::from_millis(50), "non-blocking wait took {elapsed:?}");

    set.runtime_mut().finish(a, OpStatus::Succeed);
    set.runtime_mut().finish(b, OpStatus::Succeed);
    set.wait(WAIT_FOREVER).unwrap();
    set.close().unwrap();
}

#[test]
fn wait_on_empty_set_is_a_noop() {
    let mut set = new_set();

    let status = set.wait(WAIT_NONE).unwrap();
    assert_eq!(status.in_progress, 0);
    assert!(!status.op_failed);

    let status = set.wait(WAIT_FOREVER).unwrap();
    assert_eq!(status.in_progress, 0);
    assert!(!status.op_failed);

    set.close().unwrap();
}

#[test]
fn wait_after_failure_reports_latched_flag() {
    let mut set = new_set();
    append_scripted(&mut set, &[OpStatus::Fail]);
    set.wait(WAIT_FOREVER).unwrap();

    // Active list is empty; op_failed mirrors the latched error state.
    let status = set.wait(WAIT_NONE).unwrap();
    assert_eq!(status.in_progress, 0);
    assert!(status.op_failed);

    set.err_info(1).unwrap();
    let status = set.wait(WAIT_NONE).unwrap();
    assert!(!status.op_failed);

    set.close().unwrap();
}

#[test]
fn records_poll_in_insertion_order_every_sweep() {
    let mut set = new_set();
    let a = append_scripted(&mut set, &[OpStatus::InProgress, OpStatus::Succeed]);
    let b = append_scripted(&mut set, &[OpStatus::Succeed]);
    let c = append_scripted(&mut set, &[OpStatus::InProgress, OpStatus::Succeed]);

    set.wait(WAIT_FOREVER).unwrap();

    let log = &set.runtime().poll_log;
    // Sweep 1 visits all three in insertion order; b leaves mid-sweep.
    // Sweep 2 visits the survivors, still in insertion order.
    assert_eq!(log[..3], [a, b, c]);
    assert_eq!(log[3..], [a, c]);

    set.close().unwrap();
}

#[test]
fn cancel_is_bookkept_like_failure() {
    let mut set = new_set();
    append_scripted(&mut set, &[OpStatus::Cancel]);

    let status = set.wait(WAIT_FOREVER).unwrap();
    assert!(status.op_failed);
    assert!(set.err_status());
    assert_eq!(set.err_count(), 1);

    let infos = set.err_info(1).unwrap();
    assert_eq!(infos[0].status, OpStatus::Cancel);
    assert_eq!(infos[0].stack.len(), 1);

    let runtime = set.close().unwrap();
    runtime.assert_all_released_once();
}

#[test]
fn runtime_fault_aborts_wait_without_losing_records() {
    let mut set = new_set();
    append_scripted(&mut set, &[OpStatus::InProgress, OpStatus::Succeed]);
    set.runtime_mut()
        .arm_poll_fault(RuntimeFault::new("submission ring torn down"));

    let err = set.wait(WAIT_FOREVER).unwrap_err();
    assert!(matches!(err, Error::CantWait(_)));
    assert_eq!(set.count(), 1);

    // The fault was transient; the record is still pollable.
    let status = set.wait(WAIT_FOREVER).unwrap();
    assert_eq!(status.in_progress, 0);
    assert!(!status.op_failed);

    set.close().unwrap();
}

// ==================== Hooks ====================

#[test]
fn complete_hook_sees_final_statuses_in_sweep_order() {
    let mut set = new_set();
    let log: Rc<RefCell<Vec<(u64, OpStatus)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    set.register_complete_fn(move |info, status| {
        sink.borrow_mut().push((info.counter, status));
        Ok(())
    });

    for i in 0..4 {
        let script = if i == 2 {
            [OpStatus::Fail]
        } else {
            [OpStatus::Succeed]
        };
        append_scripted(&mut set, &script);
    }

    set.wait(WAIT_FOREVER).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            (0, OpStatus::Succeed),
            (1, OpStatus::Succeed),
            (2, OpStatus::Fail),
            (3, OpStatus::Succeed),
        ]
    );

    set.err_info(1).unwrap();
    set.close().unwrap();
}

#[test]
fn complete_hook_failure_does_not_abort_the_sweep() {
    let mut set = new_set();
    set.register_complete_fn(|_, _| Err(eventset::HookError::new("observer down")));

    for _ in 0..3 {
        append_scripted(&mut set, &[OpStatus::Succeed]);
    }

    let status = set.wait(WAIT_FOREVER).unwrap();
    assert_eq!(status.in_progress, 0);
    assert!(!status.op_failed);

    let runtime = set.close().unwrap();
    runtime.assert_all_released_once();
}

// ==================== Drain Arithmetic ====================

#[test]
fn successive_drains_clear_min_of_requested_and_available() {
    let mut set = new_set();
    for _ in 0..5 {
        append_scripted(&mut set, &[OpStatus::Fail]);
    }
    set.wait(WAIT_FOREVER).unwrap();

    let mut cleared = 0;
    cleared += set.err_info(2).unwrap().len();
    cleared += set.err_info(2).unwrap().len();
    cleared += set.err_info(2).unwrap().len();
    assert_eq!(cleared, 5);

    // Draining an already-empty failed list clears nothing.
    assert_eq!(set.err_info(2).unwrap().len(), 0);

    let runtime = set.close().unwrap();
    runtime.assert_all_released_once();
}
