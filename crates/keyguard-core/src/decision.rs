//! Show decision.
//!
//! Answers one question: given everything the mediator currently knows,
//! should a "show" command be queued? The rules are ordered and the order is
//! significant:
//!
//! 1. Externally disabled or power-off-alarm boot: never show.
//! 2. Already showing (or a show is already queued): no-op.
//! 3. A locked or missing SIM overrides the unprovisioned and
//!    administratively-disabled checks, as does an anti-theft lock.
//! 4. Unprovisioned device: do not show.
//! 5. Lock screen administratively disabled: do not show.
//! 6. Storage just decrypted: force a hide instead (one-time bypass).
//! 7. Otherwise show, carrying the caller's options.

use crate::{options::ShowOptions, sim::SimCondition};

/// Lock status of a single SIM subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionLock {
    /// Reported SIM condition.
    pub condition: SimCondition,
    /// Whether the SIM currently requires a PIN or PUK.
    pub pin_secure: bool,
}

impl SubscriptionLock {
    /// Whether this subscription forces the lock surface.
    ///
    /// A PIN/PUK secure SIM always does; an absent or permanently disabled SIM
    /// only does when SIM presence is required.
    pub fn is_locked_or_missing(&self, require_sim: bool) -> bool {
        self.pin_secure
            || (require_sim
                && matches!(self.condition, SimCondition::Absent | SimCondition::PermDisabled))
    }
}

/// Snapshot of every input the decision depends on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShowInputs {
    /// External callers permit the lock surface.
    pub externally_enabled: bool,
    /// Booted only to ring a power-off alarm.
    pub alarm_boot: bool,
    /// The renderer reports showing, or a show is already queued.
    pub already_showing: bool,
    /// Setup wizard has completed.
    pub provisioned: bool,
    /// Lock screen disabled by the user or an administrator.
    pub lock_screen_disabled: bool,
    /// Anti-theft lock is active.
    pub anti_theft_locked: bool,
    /// Storage was just decrypted with the lock credential.
    pub just_decrypted: bool,
    /// SIM presence is required for normal operation.
    pub require_sim: bool,
    /// Per-subscription SIM lock status.
    pub subscriptions: Vec<SubscriptionLock>,
}

impl ShowInputs {
    /// Whether any subscription is PIN/PUK locked or (when required) missing.
    pub fn locked_or_missing(&self) -> bool {
        self.subscriptions.iter().any(|sub| sub.is_locked_or_missing(self.require_sim))
    }
}

/// Why the decision declined to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// An external caller disabled the keyguard.
    ExternallyDisabled,
    /// Power-off-alarm boot owns the screen.
    AlarmBoot,
    /// Nothing to do.
    AlreadyShowing,
    /// Device not provisioned and no SIM or anti-theft reason to lock.
    NotProvisioned,
    /// Lock screen disabled and no SIM or anti-theft reason to lock.
    LockScreenDisabled,
}

/// Outcome of [`evaluate_show_decision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowDecision {
    /// Queue a show with these options.
    Show(Option<ShowOptions>),
    /// Mark hidden and queue a hide.
    ForceHide,
    /// Leave everything as it is.
    Skip(SkipReason),
}

/// Decide whether the lock surface should be shown.
///
/// Pure: the same inputs always produce the same decision.
pub fn evaluate_show_decision(inputs: &ShowInputs, options: Option<ShowOptions>) -> ShowDecision {
    if !inputs.externally_enabled {
        return ShowDecision::Skip(SkipReason::ExternallyDisabled);
    }
    if inputs.alarm_boot {
        return ShowDecision::Skip(SkipReason::AlarmBoot);
    }

    if inputs.already_showing {
        return ShowDecision::Skip(SkipReason::AlreadyShowing);
    }

    let locked_or_missing = inputs.locked_or_missing();
    let overridden = locked_or_missing || inputs.anti_theft_locked;

    if !overridden && !inputs.provisioned {
        return ShowDecision::Skip(SkipReason::NotProvisioned);
    }

    if !overridden && inputs.lock_screen_disabled {
        return ShowDecision::Skip(SkipReason::LockScreenDisabled);
    }

    if inputs.just_decrypted {
        return ShowDecision::ForceHide;
    }

    ShowDecision::Show(options)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::options::SurfaceVariant;

    fn ready() -> ShowInputs {
        ShowInputs { externally_enabled: true, provisioned: true, ..Default::default() }
    }

    fn sim(condition: SimCondition, pin_secure: bool) -> SubscriptionLock {
        SubscriptionLock { condition, pin_secure }
    }

    #[test]
    fn provisioned_device_shows() {
        assert_eq!(evaluate_show_decision(&ready(), None), ShowDecision::Show(None));
    }

    #[test]
    fn options_are_carried_forward() {
        let options = ShowOptions::with_variant(SurfaceVariant::Bouncer);
        assert_eq!(
            evaluate_show_decision(&ready(), Some(options.clone())),
            ShowDecision::Show(Some(options))
        );
    }

    #[test]
    fn unprovisioned_without_sim_does_not_show() {
        let inputs = ShowInputs {
            provisioned: false,
            subscriptions: vec![sim(SimCondition::Absent, false)],
            ..ready()
        };
        assert_eq!(
            evaluate_show_decision(&inputs, None),
            ShowDecision::Skip(SkipReason::NotProvisioned)
        );
    }

    #[test]
    fn absent_sim_locks_unprovisioned_device_when_required() {
        let inputs = ShowInputs {
            provisioned: false,
            require_sim: true,
            subscriptions: vec![sim(SimCondition::Absent, false)],
            ..ready()
        };
        assert_eq!(evaluate_show_decision(&inputs, None), ShowDecision::Show(None));
    }

    #[test]
    fn pin_locked_sim_overrides_disabled_lock_screen() {
        let inputs = ShowInputs {
            lock_screen_disabled: true,
            subscriptions: vec![sim(SimCondition::PinRequired, true)],
            ..ready()
        };
        assert_eq!(evaluate_show_decision(&inputs, None), ShowDecision::Show(None));
    }

    #[test]
    fn anti_theft_overrides_unprovisioned() {
        let inputs = ShowInputs { provisioned: false, anti_theft_locked: true, ..ready() };
        assert_eq!(evaluate_show_decision(&inputs, None), ShowDecision::Show(None));
    }

    #[test]
    fn disabled_lock_screen_does_not_show() {
        let inputs = ShowInputs { lock_screen_disabled: true, ..ready() };
        assert_eq!(
            evaluate_show_decision(&inputs, None),
            ShowDecision::Skip(SkipReason::LockScreenDisabled)
        );
    }

    #[test]
    fn just_decrypted_forces_hide() {
        let inputs = ShowInputs { just_decrypted: true, ..ready() };
        assert_eq!(evaluate_show_decision(&inputs, None), ShowDecision::ForceHide);
    }

    #[test]
    fn external_disable_beats_sim_lock() {
        let inputs = ShowInputs {
            externally_enabled: false,
            anti_theft_locked: true,
            subscriptions: vec![sim(SimCondition::PukRequired, true)],
            ..ready()
        };
        assert_eq!(
            evaluate_show_decision(&inputs, None),
            ShowDecision::Skip(SkipReason::ExternallyDisabled)
        );
    }

    #[test]
    fn alarm_boot_beats_anti_theft() {
        let inputs = ShowInputs { alarm_boot: true, anti_theft_locked: true, ..ready() };
        assert_eq!(evaluate_show_decision(&inputs, None), ShowDecision::Skip(SkipReason::AlarmBoot));
    }

    #[test]
    fn already_showing_is_a_no_op() {
        let inputs = ShowInputs { already_showing: true, ..ready() };
        assert_eq!(
            evaluate_show_decision(&inputs, None),
            ShowDecision::Skip(SkipReason::AlreadyShowing)
        );
    }

    fn arb_condition() -> impl Strategy<Value = SimCondition> {
        prop_oneof![
            Just(SimCondition::NotReady),
            Just(SimCondition::Absent),
            Just(SimCondition::PinRequired),
            Just(SimCondition::PukRequired),
            Just(SimCondition::NetworkLocked),
            Just(SimCondition::PermDisabled),
            Just(SimCondition::Ready),
        ]
    }

    prop_compose! {
        fn arb_inputs()(
            externally_enabled in any::<bool>(),
            alarm_boot in any::<bool>(),
            already_showing in any::<bool>(),
            provisioned in any::<bool>(),
            lock_screen_disabled in any::<bool>(),
            anti_theft_locked in any::<bool>(),
            just_decrypted in any::<bool>(),
            require_sim in any::<bool>(),
            subscriptions in prop::collection::vec(
                (arb_condition(), any::<bool>())
                    .prop_map(|(condition, pin_secure)| SubscriptionLock { condition, pin_secure }),
                0..3,
            ),
        ) -> ShowInputs {
            ShowInputs {
                externally_enabled,
                alarm_boot,
                already_showing,
                provisioned,
                lock_screen_disabled,
                anti_theft_locked,
                just_decrypted,
                require_sim,
                subscriptions,
            }
        }
    }

    proptest! {
        #[test]
        fn decision_is_idempotent(inputs in arb_inputs()) {
            prop_assert_eq!(
                evaluate_show_decision(&inputs, None),
                evaluate_show_decision(&inputs, None)
            );
        }

        #[test]
        fn never_shows_when_disabled_or_alarm_boot(inputs in arb_inputs()) {
            if !inputs.externally_enabled || inputs.alarm_boot {
                prop_assert!(matches!(
                    evaluate_show_decision(&inputs, None),
                    ShowDecision::Skip(SkipReason::ExternallyDisabled | SkipReason::AlarmBoot)
                ));
            }
        }

        #[test]
        fn sim_or_anti_theft_lock_always_reaches_show_or_hide(inputs in arb_inputs()) {
            let gated = !inputs.externally_enabled || inputs.alarm_boot || inputs.already_showing;
            if !gated && (inputs.locked_or_missing() || inputs.anti_theft_locked) {
                prop_assert!(!matches!(evaluate_show_decision(&inputs, None), ShowDecision::Skip(_)));
            }
        }
    }
}
