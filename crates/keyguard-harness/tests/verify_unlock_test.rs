//! Verify-unlock tests.
//!
//! While an external caller has the keyguard disabled, another caller can ask
//! the user to pass it anyway. Exactly one request may be outstanding; every
//! request gets exactly one result.

use std::thread;

use keyguard_core::RejectReason;
use keyguard_harness::{Effect, TestBed};
use keyguard_mediator::{PresentationPhase, ScreenOffReason};

fn disabled() -> TestBed {
    let bed = TestBed::start().expect("starts");
    bed.mediator.set_keyguard_enabled(false);
    bed.settle();
    bed.platform.take_effects();
    bed
}

fn results(bed: &TestBed) -> Vec<bool> {
    bed.platform
        .effects()
        .into_iter()
        .filter_map(|e| match e {
            Effect::ExitResult(ok) => Some(ok),
            _ => None,
        })
        .collect()
}

#[test]
fn rejected_before_provisioning() {
    let bed = TestBed::builder().knobs(|k| k.provisioned = false).build().expect("starts");
    bed.mediator.set_keyguard_enabled(false);

    let result = bed.mediator.verify_unlock(bed.exit_callback());

    assert_eq!(result, Err(RejectReason::NotProvisioned));
    // Completed before returning.
    assert_eq!(results(&bed), vec![false]);
}

#[test]
fn rejected_while_enabled() {
    let bed = TestBed::start().expect("starts");

    let result = bed.mediator.verify_unlock(bed.exit_callback());

    assert_eq!(result, Err(RejectReason::NotExternallyDisabled));
    assert_eq!(results(&bed), vec![false]);
    assert!(!bed.snapshot().verify_pending);
}

#[test]
fn accepted_while_disabled() {
    let bed = disabled();

    bed.mediator.verify_unlock(bed.exit_callback()).expect("accepted");
    bed.settle();

    assert!(bed.platform.saw(&Effect::VerifyUnlock));
    let snapshot = bed.snapshot();
    assert!(snapshot.verify_pending);
    assert!(snapshot.showing);
    assert!(snapshot.renderer_showing);
    assert!(results(&bed).is_empty());
}

#[test]
fn second_request_rejected() {
    let bed = disabled();
    bed.mediator.verify_unlock(bed.exit_callback()).expect("accepted");

    let second = bed.mediator.verify_unlock(bed.exit_callback());

    assert_eq!(second, Err(RejectReason::VerifyInProgress));
    assert_eq!(results(&bed), vec![false]);
    assert!(bed.snapshot().verify_pending);
}

#[test]
fn authenticated_done_succeeds_and_re_enables() {
    let bed = disabled();
    bed.mediator.verify_unlock(bed.exit_callback()).expect("accepted");
    bed.settle();

    bed.mediator.keyguard_done(true, true);
    bed.settle();

    assert_eq!(results(&bed), vec![true]);
    let snapshot = bed.snapshot();
    assert!(snapshot.externally_enabled);
    assert!(!snapshot.needs_reshow_when_reenabled);
    assert!(!snapshot.verify_pending);
    assert_eq!(snapshot.phase, PresentationPhase::Hidden);
}

#[test]
fn abandoned_done_fails_and_stays_disabled() {
    let bed = disabled();
    bed.mediator.verify_unlock(bed.exit_callback()).expect("accepted");
    bed.settle();

    bed.mediator.keyguard_done(false, true);
    bed.settle();

    assert_eq!(results(&bed), vec![false]);
    let snapshot = bed.snapshot();
    assert!(!snapshot.externally_enabled);
    assert!(snapshot.needs_reshow_when_reenabled);
    assert_eq!(snapshot.phase, PresentationPhase::Hidden);
}

#[test]
fn screen_off_fails_outstanding_request() {
    let bed = disabled();
    bed.mediator.verify_unlock(bed.exit_callback()).expect("accepted");
    bed.settle();

    bed.mediator.on_screen_turned_off(ScreenOffReason::User);
    bed.settle();

    assert_eq!(results(&bed), vec![false]);
    let snapshot = bed.snapshot();
    assert!(!snapshot.verify_pending);
    assert_eq!(snapshot.phase, PresentationPhase::Hidden);
    assert_eq!(bed.platform.shows(), 0);
}

#[test]
fn new_request_accepted_after_previous_resolves() {
    let bed = disabled();
    bed.mediator.verify_unlock(bed.exit_callback()).expect("accepted");
    bed.mediator.keyguard_done(false, true);
    bed.settle();

    bed.mediator.verify_unlock(bed.exit_callback()).expect("accepted again");
    assert!(bed.snapshot().verify_pending);
}

#[test]
fn concurrent_requests_admit_exactly_one() {
    const CALLERS: usize = 8;
    let bed = disabled();

    let outcomes: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| s.spawn(|| bed.mediator.verify_unlock(bed.exit_callback())))
            .collect();
        handles.into_iter().map(|h| h.join().expect("caller thread")).collect()
    });

    let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    assert!(
        outcomes
            .iter()
            .filter_map(|r| r.err())
            .all(|reason| reason == RejectReason::VerifyInProgress)
    );
    assert_eq!(results(&bed), vec![false; CALLERS - 1]);

    bed.mediator.keyguard_done(true, true);
    bed.settle();
    assert_eq!(bed.platform.count(|e| *e == Effect::ExitResult(true)), 1);
}
