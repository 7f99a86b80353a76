//! Property tests over random event sequences.
//!
//! proptest generates a sequence of host events; each is applied to a real
//! mediator and, once the executor settles, the session is checked against
//! invariants that must hold no matter what came before:
//!
//! - The session's `showing` flag matches what the renderer actually shows
//! - Every show wake-lock acquire has been released
//! - No hide is left half-finished
//! - Nothing is left queued
//! - Every verify-unlock request gets exactly one result

use std::time::Duration;

use keyguard_core::SimCondition;
use keyguard_harness::{
    Effect, SimSlot, TestBed,
    scenario::{Knob, Step},
};
use keyguard_mediator::{PresentationPhase, ScreenOffReason};
use proptest::prelude::*;

fn screen_off_reason() -> impl Strategy<Value = ScreenOffReason> {
    prop_oneof![
        Just(ScreenOffReason::User),
        Just(ScreenOffReason::Timeout),
        Just(ScreenOffReason::Admin),
        Just(ScreenOffReason::ProximitySensor),
    ]
}

fn sim_condition() -> impl Strategy<Value = SimCondition> {
    prop_oneof![
        Just(SimCondition::Absent),
        Just(SimCondition::PinRequired),
        Just(SimCondition::PukRequired),
        Just(SimCondition::Ready),
    ]
}

/// Knobs that change decisions without changing how the fakes respond.
fn knob() -> impl Strategy<Value = Knob> {
    prop_oneof![
        Just(Knob::Secure),
        Just(Knob::InstantLock),
        Just(Knob::Bouncer),
        Just(Knob::LockSounds),
    ]
}

fn screen_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        screen_off_reason().prop_map(Step::ScreenOff),
        Just(Step::ScreenOn),
        Just(Step::DreamStart),
        Just(Step::DreamStop),
        (0u64..8).prop_map(|s| Step::Advance(Duration::from_secs(s))),
    ]
}

fn unlock_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        any::<bool>().prop_map(Step::Enable),
        Just(Step::Verify),
        any::<bool>().prop_map(|authenticated| Step::Done { authenticated }),
        Just(Step::Dismiss),
        Just(Step::Timeout(None)),
        Just(Step::Biometric),
    ]
}

fn platform_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        any::<bool>().prop_map(Step::Occlude),
        any::<bool>().prop_map(Step::PhoneIdle),
        sim_condition().prop_map(|c| Step::Sim(1, SimSlot::new(c))),
        (knob(), any::<bool>()).prop_map(|(k, on)| Step::Set(k, on)),
    ]
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => screen_step(),
        4 => unlock_step(),
        2 => platform_step(),
    ]
}

fn check_invariants(bed: &TestBed, step: &Step, index: usize) -> Result<(), TestCaseError> {
    let snapshot = bed.snapshot();

    prop_assert_eq!(
        snapshot.showing,
        bed.platform.renderer_showing(),
        "showing diverged from renderer after step {} {:?}: {:?}",
        index,
        step,
        snapshot
    );
    prop_assert_eq!(snapshot.renderer_showing, bed.platform.renderer_showing());
    prop_assert!(!bed.platform.wake_lock_held(), "wake lock held after step {} {:?}", index, step);
    prop_assert_eq!(
        bed.platform.count(|e| *e == Effect::WakeLockAcquired),
        bed.platform.count(|e| *e == Effect::WakeLockReleased)
    );
    prop_assert_ne!(snapshot.phase, PresentationPhase::Hiding, "hide stuck after {:?}", step);
    prop_assert!(!snapshot.waiting_for_visible);
    prop_assert_eq!(bed.mediator.pending_commands(), 0);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Session and renderer agree after any event sequence.
    #[test]
    fn prop_session_matches_renderer(steps in prop::collection::vec(step_strategy(), 1..24)) {
        let bed = TestBed::start().expect("mediator starts");

        for (i, step) in steps.iter().enumerate() {
            step.apply(&bed);
            check_invariants(&bed, step, i)?;
        }
    }

    /// Every verify-unlock request gets exactly one result once the session
    /// is torn down by a screen-off or a done.
    #[test]
    fn prop_every_verify_resolves(steps in prop::collection::vec(step_strategy(), 0..16)) {
        let bed = TestBed::start().expect("mediator starts");
        for step in &steps {
            step.apply(&bed);
        }

        // Resolve anything still outstanding.
        Step::ScreenOff(ScreenOffReason::User).apply(&bed);
        prop_assert!(!bed.snapshot().verify_pending);

        let requests = steps.iter().filter(|s| **s == Step::Verify).count();
        let results = bed.platform.count(|e| matches!(e, Effect::ExitResult(_)));
        prop_assert_eq!(results, requests);
    }

    /// The delayed lock only ever fires with the screen off.
    #[test]
    fn prop_delayed_lock_needs_screen_off(
        reason in screen_off_reason(),
        wait in 0u64..10,
        screen_back_on in any::<bool>(),
    ) {
        let bed = TestBed::start().expect("mediator starts");
        Step::Done { authenticated: true }.apply(&bed);
        bed.advance(Duration::from_secs(1));
        let shows_before = bed.platform.shows();

        Step::ScreenOff(reason).apply(&bed);
        if screen_back_on {
            Step::ScreenOn.apply(&bed);
        }
        let shown_at_screen_off = bed.platform.shows() > shows_before;
        bed.advance(Duration::from_secs(wait));
        let shown = bed.platform.shows() > shows_before;

        if screen_back_on && !shown_at_screen_off {
            prop_assert!(!shown, "{:?} lock fired after the screen came back on", reason);
        }
        if reason == ScreenOffReason::ProximitySensor {
            prop_assert!(!shown);
        }
    }
}
