//! Screen, dream and power-off event tests.
//!
//! Covers when a screen-off locks immediately, when it arms the delayed lock,
//! and how screen-on, dreams and the instant power-off flag interact with the
//! delayed-lock alarm.

use std::time::Duration;

use keyguard_harness::{Effect, TestBed};
use keyguard_mediator::{PresentationPhase, ScreenOffReason, Sound};

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

/// Booted bed, unlocked, with the boot-time close-dialogs alarm already
/// fired and the effect log cleared.
fn unlocked(bed: TestBed) -> TestBed {
    bed.mediator.keyguard_done(true, true);
    bed.settle();
    bed.advance(secs(1));
    assert_eq!(bed.snapshot().phase, PresentationPhase::Hidden);
    assert_eq!(bed.scheduler.pending(), 0);
    bed.platform.take_effects();
    bed
}

fn default_unlocked() -> TestBed {
    unlocked(TestBed::start().expect("mediator starts"))
}

#[test]
fn screen_off_while_showing_resets_renderer() {
    let bed = TestBed::start().expect("starts");
    bed.platform.take_effects();

    bed.mediator.on_screen_turned_off(ScreenOffReason::User);
    bed.settle();

    assert!(bed.platform.saw(&Effect::RendererScreenOff));
    assert!(bed.platform.saw(&Effect::Reset));
    assert_eq!(bed.platform.shows(), 0);
    assert!(!bed.snapshot().screen_on);
}

#[test]
fn power_button_locks_immediately() {
    let bed = default_unlocked();

    bed.mediator.on_screen_turned_off(ScreenOffReason::User);
    bed.settle();

    assert_eq!(bed.platform.shows(), 1);
    assert!(bed.platform.saw(&Effect::Sound(Sound::Locked)));
    assert_eq!(bed.snapshot().phase, PresentationPhase::Showing);
}

#[test]
fn admin_lock_is_immediate() {
    let bed = unlocked(
        TestBed::builder().knobs(|k| k.instant_lock = false).build().expect("starts"),
    );

    bed.mediator.on_screen_turned_off(ScreenOffReason::Admin);
    bed.settle();

    assert_eq!(bed.platform.shows(), 1);
}

#[test]
fn timeout_arms_delayed_lock() {
    let bed = default_unlocked();

    bed.mediator.on_screen_turned_off(ScreenOffReason::Timeout);
    bed.settle();

    let seq = bed.snapshot().delayed_show_sequence;
    assert_eq!(bed.scheduler.pending_alarms(), vec![(secs(5), seq)]);
    assert_eq!(bed.platform.shows(), 0);

    assert_eq!(bed.advance(secs(4)), 0);
    assert_eq!(bed.platform.shows(), 0);

    assert_eq!(bed.advance(secs(1)), 1);
    assert_eq!(bed.platform.shows(), 1);
    assert_eq!(bed.snapshot().phase, PresentationPhase::Showing);

    // The screen went off on its own; the lock is silent.
    assert!(!bed.platform.saw(&Effect::Sound(Sound::Locked)));
}

#[test]
fn screen_on_cancels_delayed_lock() {
    let bed = default_unlocked();

    bed.mediator.on_screen_turned_off(ScreenOffReason::Timeout);
    bed.mediator.on_screen_turned_on(None);
    bed.settle();

    // The alarm still fires but is stale.
    assert_eq!(bed.advance(secs(5)), 1);
    assert_eq!(bed.platform.shows(), 0);
    assert_eq!(bed.snapshot().phase, PresentationPhase::Hidden);
    assert!(bed.platform.saw(&Effect::DispatchScreenOn));
}

#[test]
fn policy_caps_delay() {
    let bed = unlocked(
        TestBed::builder()
            .knobs(|k| {
                k.screen_off_timeout = Some(secs(30));
                k.max_time_to_lock = Some(secs(32));
            })
            .build()
            .expect("starts"),
    );

    bed.mediator.on_screen_turned_off(ScreenOffReason::Timeout);
    bed.settle();

    let alarms = bed.scheduler.pending_alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].0, secs(2));
}

#[test]
fn policy_already_exceeded_locks_now_silently() {
    let bed = unlocked(
        TestBed::builder()
            .knobs(|k| {
                k.screen_off_timeout = Some(secs(30));
                k.max_time_to_lock = Some(secs(20));
            })
            .build()
            .expect("starts"),
    );

    bed.mediator.on_screen_turned_off(ScreenOffReason::Timeout);
    bed.settle();

    assert_eq!(bed.platform.shows(), 1);
    assert!(!bed.platform.saw(&Effect::Sound(Sound::Locked)));
}

#[test]
fn missing_policy_values_fall_back_to_config() {
    let bed = unlocked(
        TestBed::builder()
            .knobs(|k| {
                k.screen_off_timeout = None;
                k.lock_after = None;
            })
            .config(|c| c.default_lock_after = secs(9))
            .build()
            .expect("starts"),
    );

    bed.mediator.on_screen_turned_off(ScreenOffReason::Timeout);
    bed.settle();

    let alarms = bed.scheduler.pending_alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].0, secs(9));
}

#[test]
fn power_button_without_instant_lock_is_delayed() {
    let bed = unlocked(
        TestBed::builder().knobs(|k| k.instant_lock = false).build().expect("starts"),
    );

    bed.mediator.on_screen_turned_off(ScreenOffReason::User);
    bed.settle();

    assert_eq!(bed.platform.shows(), 0);
    assert_eq!(bed.scheduler.pending(), 1);
}

#[test]
fn insecure_device_locks_immediately() {
    let bed = unlocked(
        TestBed::builder()
            .knobs(|k| {
                k.instant_lock = false;
                k.secure = false;
            })
            .build()
            .expect("starts"),
    );

    bed.mediator.on_screen_turned_off(ScreenOffReason::User);
    bed.settle();

    assert_eq!(bed.platform.shows(), 1);
    assert_eq!(bed.scheduler.pending_alarms().len(), 1, "only the close-dialogs alarm");
}

#[test]
fn proximity_sensor_does_not_lock() {
    let bed = default_unlocked();

    bed.mediator.on_screen_turned_off(ScreenOffReason::ProximitySensor);
    bed.settle();

    assert_eq!(bed.platform.shows(), 0);
    assert_eq!(bed.scheduler.pending(), 0);
    assert!(bed.platform.saw(&Effect::DispatchScreenOff(ScreenOffReason::ProximitySensor)));
}

#[test]
fn call_ending_with_screen_off_locks() {
    let bed = default_unlocked();
    bed.platform.notify(|cb| cb.on_phone_state_changed(false));
    bed.mediator.on_screen_turned_off(ScreenOffReason::ProximitySensor);
    bed.settle();
    assert_eq!(bed.platform.shows(), 0);

    bed.platform.notify(|cb| cb.on_phone_state_changed(true));
    bed.settle();

    assert_eq!(bed.platform.shows(), 1);
    assert!(bed.snapshot().phone_idle);
}

#[test]
fn power_off_in_progress_locks_immediately() {
    let bed = unlocked(
        TestBed::builder().knobs(|k| k.instant_lock = false).build().expect("starts"),
    );

    bed.mediator.on_ipo_shutdown();
    assert!(bed.snapshot().ipo_shutdown);

    bed.mediator.on_screen_turned_off(ScreenOffReason::User);
    bed.settle();
    assert_eq!(bed.platform.shows(), 1);
}

#[test]
fn power_off_flag_expires() {
    let bed = default_unlocked();

    bed.mediator.on_ipo_shutdown();
    bed.advance(secs(3));
    assert!(bed.snapshot().ipo_shutdown);

    bed.advance(secs(1));
    assert!(!bed.snapshot().ipo_shutdown);
}

#[test]
fn stale_power_off_expiry_is_ignored() {
    let bed = default_unlocked();

    bed.mediator.on_ipo_shutdown();
    bed.advance(secs(2));
    bed.mediator.on_ipo_bootup();
    assert!(!bed.snapshot().ipo_shutdown);

    // A second shutdown restarts the clock; the first alarm must not clear it.
    bed.mediator.on_ipo_shutdown();
    bed.advance(secs(2));
    assert!(bed.snapshot().ipo_shutdown);

    bed.advance(secs(2));
    assert!(!bed.snapshot().ipo_shutdown);
}

#[test]
fn secure_dream_locks_after_delay() {
    let bed = default_unlocked();

    bed.mediator.on_dreaming_started();
    assert_eq!(bed.scheduler.pending(), 1);

    bed.advance(secs(5));
    assert_eq!(bed.platform.shows(), 1);
}

#[test]
fn dream_stop_cancels_delayed_lock() {
    let bed = default_unlocked();

    bed.mediator.on_dreaming_started();
    bed.mediator.on_dreaming_stopped();
    bed.advance(secs(5));

    assert_eq!(bed.platform.shows(), 0);
}

#[test]
fn insecure_dream_does_not_lock() {
    let bed = unlocked(TestBed::builder().knobs(|k| k.secure = false).build().expect("starts"));

    bed.mediator.on_dreaming_started();
    assert_eq!(bed.scheduler.pending(), 0);
}

#[test]
fn screen_on_fires_show_callback() {
    let bed = TestBed::start().expect("starts");
    bed.platform.take_effects();

    bed.mediator.on_screen_turned_on(Some(bed.show_callback()));
    bed.settle();

    let drawn = bed.platform.position(&Effect::RendererScreenOn).expect("renderer told");
    let shown = bed.platform.position(&Effect::Shown).expect("callback fired");
    assert!(drawn < shown);
}

#[test]
fn renderer_may_hold_show_callback() {
    let bed = TestBed::builder().knobs(|k| k.renderer.auto_shown = false).build().expect("starts");

    bed.mediator.on_screen_turned_on(Some(bed.show_callback()));
    bed.settle();
    assert!(!bed.platform.saw(&Effect::Shown));

    assert!(bed.platform.finish_screen_on());
    assert!(bed.platform.saw(&Effect::Shown));
}

#[test]
fn screen_on_sends_user_present_when_lock_screen_disabled() {
    let bed = TestBed::builder().knobs(|k| k.lock_screen_disabled = true).build().expect("starts");
    bed.platform.take_effects();

    bed.mediator.on_screen_turned_on(None);

    assert!(bed.platform.saw(&Effect::UserPresent(0)));
}

#[test]
fn rearmed_dream_lock_replaces_earlier_alarm() {
    let bed = default_unlocked();

    bed.mediator.on_dreaming_started();
    bed.advance(secs(3));
    bed.mediator.on_dreaming_started();

    // The first alarm comes due at 5 s but was replaced.
    assert_eq!(bed.advance(secs(2)), 1);
    assert_eq!(bed.platform.shows(), 0);
    assert_eq!(bed.snapshot().phase, PresentationPhase::Hidden);

    assert_eq!(bed.advance(secs(3)), 1);
    assert_eq!(bed.platform.shows(), 1);
}

#[test]
fn only_latest_timeout_lock_fires() {
    let bed = default_unlocked();

    bed.mediator.on_screen_turned_off(ScreenOffReason::Timeout);
    bed.mediator.on_screen_turned_on(None);
    bed.advance(secs(2));
    bed.mediator.on_screen_turned_off(ScreenOffReason::Timeout);
    bed.settle();
    assert_eq!(bed.scheduler.pending(), 2);

    // First timer: armed at 0 s, due at 5 s, cancelled by the screen-on.
    assert_eq!(bed.advance(secs(3)), 1);
    assert_eq!(bed.platform.shows(), 0);

    // Second timer: armed at 2 s, due at 7 s.
    assert_eq!(bed.advance(secs(2)), 1);
    assert_eq!(bed.platform.shows(), 1);
    assert_eq!(bed.snapshot().phase, PresentationPhase::Showing);
}
