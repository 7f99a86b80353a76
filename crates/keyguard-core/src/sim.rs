//! SIM state handling.
//!
//! Telephony reports one [`SimCondition`] per subscription. The mediator turns
//! each report into a [`SimOutcome`] with [`evaluate_sim_change`], then acts
//! on it under its lock.

/// SIM card condition reported by telephony.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCondition {
    /// Radio has not reported yet.
    NotReady,
    /// No card inserted.
    Absent,
    /// Card requires its PIN.
    PinRequired,
    /// Card requires its PUK.
    PukRequired,
    /// Card is network (ME) locked.
    NetworkLocked,
    /// Card is permanently disabled.
    PermDisabled,
    /// Card is unlocked and usable.
    Ready,
}

/// Terminal SIM failures that are reported through a blocking dialog instead
/// of the normal lock surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingDialog {
    /// PUK retries exhausted; the card is unusable.
    InvalidSim,
    /// ME unlock retries exhausted; the slot is permanently locked.
    MeLocked,
}

/// What the mediator should do in response to a SIM report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimAction {
    /// Evaluate the show decision now.
    Show,
    /// A done sequence is in flight; schedule a delayed show instead of
    /// racing it.
    ShowLater,
    /// Refresh the renderer without a show/hide transition.
    Reset,
    /// Ask the dialog manager for a blocking dialog.
    Dialog(BlockingDialog),
    /// No change.
    Ignore,
}

/// Result of [`evaluate_sim_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimOutcome {
    /// Action to take.
    pub action: SimAction,
    /// New value for the subscription's PIN/PUK/ME dismiss flag, if it
    /// changes.
    pub pin_dismiss_flag: Option<bool>,
}

impl SimOutcome {
    const fn action(action: SimAction) -> Self {
        Self { action, pin_dismiss_flag: None }
    }
}

/// State the SIM reaction depends on, captured under the mediator lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimContext {
    /// Setup wizard has completed.
    pub provisioned: bool,
    /// Lock surface is currently showing.
    pub showing: bool,
    /// A done/hide sequence is in flight.
    pub done_in_progress: bool,
    /// Airplane mode is on.
    pub airplane_mode: bool,
    /// The platform honours network (ME) locks.
    pub me_lock_supported: bool,
    /// Remaining PUK attempts, when known.
    pub puk_retries: Option<u32>,
    /// Remaining ME unlock attempts, when known.
    pub me_retries: Option<u32>,
}

/// Decide how to react to a SIM condition.
pub fn evaluate_sim_change(condition: SimCondition, ctx: &SimContext) -> SimOutcome {
    match condition {
        SimCondition::NotReady | SimCondition::Absent => {
            // Only a device that has not been through setup is forced to lock
            // on a missing SIM.
            if ctx.provisioned {
                SimOutcome::action(SimAction::Ignore)
            } else if ctx.showing {
                SimOutcome::action(SimAction::Reset)
            } else {
                SimOutcome::action(SimAction::Show)
            }
        },
        SimCondition::PinRequired | SimCondition::PukRequired | SimCondition::NetworkLocked => {
            evaluate_pin_lock(condition, ctx)
        },
        SimCondition::PermDisabled => {
            if ctx.showing {
                SimOutcome::action(SimAction::Reset)
            } else {
                SimOutcome::action(SimAction::Show)
            }
        },
        SimCondition::Ready => SimOutcome::action(SimAction::Ignore),
    }
}

fn evaluate_pin_lock(condition: SimCondition, ctx: &SimContext) -> SimOutcome {
    let network_locked = condition == SimCondition::NetworkLocked;

    if network_locked && !ctx.me_lock_supported {
        return SimOutcome::action(SimAction::Ignore);
    }

    if ctx.puk_retries == Some(0) {
        return SimOutcome::action(SimAction::Dialog(BlockingDialog::InvalidSim));
    }

    if network_locked && ctx.me_retries == Some(0) {
        return SimOutcome::action(SimAction::Dialog(BlockingDialog::MeLocked));
    }

    if ctx.airplane_mode {
        return SimOutcome { action: SimAction::Ignore, pin_dismiss_flag: Some(true) };
    }

    let action = if !ctx.showing {
        SimAction::Show
    } else if ctx.done_in_progress {
        SimAction::ShowLater
    } else {
        SimAction::Reset
    };

    SimOutcome { action, pin_dismiss_flag: Some(false) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> SimContext {
        SimContext { provisioned: true, me_lock_supported: true, ..Default::default() }
    }

    #[test]
    fn puk_with_no_retries_requests_invalid_sim_dialog() {
        let ctx = SimContext { puk_retries: Some(0), ..ctx() };
        let outcome = evaluate_sim_change(SimCondition::PukRequired, &ctx);
        assert_eq!(outcome.action, SimAction::Dialog(BlockingDialog::InvalidSim));
        assert_eq!(outcome.pin_dismiss_flag, None);
    }

    #[test]
    fn network_lock_with_no_retries_requests_me_locked_dialog() {
        let ctx = SimContext { me_retries: Some(0), puk_retries: Some(10), ..ctx() };
        let outcome = evaluate_sim_change(SimCondition::NetworkLocked, &ctx);
        assert_eq!(outcome.action, SimAction::Dialog(BlockingDialog::MeLocked));
    }

    #[test]
    fn network_lock_ignored_without_me_support() {
        let ctx = SimContext { me_lock_supported: false, ..ctx() };
        let outcome = evaluate_sim_change(SimCondition::NetworkLocked, &ctx);
        assert_eq!(outcome, SimOutcome { action: SimAction::Ignore, pin_dismiss_flag: None });
    }

    #[test]
    fn pin_required_shows_when_hidden() {
        let outcome = evaluate_sim_change(SimCondition::PinRequired, &ctx());
        assert_eq!(outcome, SimOutcome { action: SimAction::Show, pin_dismiss_flag: Some(false) });
    }

    #[test]
    fn pin_required_resets_when_showing() {
        let ctx = SimContext { showing: true, ..ctx() };
        assert_eq!(evaluate_sim_change(SimCondition::PinRequired, &ctx).action, SimAction::Reset);
    }

    #[test]
    fn pin_required_defers_while_done_in_flight() {
        let ctx = SimContext { showing: true, done_in_progress: true, ..ctx() };
        assert_eq!(evaluate_sim_change(SimCondition::PukRequired, &ctx).action, SimAction::ShowLater);
    }

    #[test]
    fn airplane_mode_suppresses_pin_surface() {
        let ctx = SimContext { airplane_mode: true, ..ctx() };
        let outcome = evaluate_sim_change(SimCondition::PinRequired, &ctx);
        assert_eq!(outcome, SimOutcome { action: SimAction::Ignore, pin_dismiss_flag: Some(true) });
    }

    #[test]
    fn absent_sim_only_matters_before_provisioning() {
        assert_eq!(evaluate_sim_change(SimCondition::Absent, &ctx()).action, SimAction::Ignore);

        let unprovisioned = SimContext { provisioned: false, ..ctx() };
        assert_eq!(evaluate_sim_change(SimCondition::Absent, &unprovisioned).action, SimAction::Show);

        let showing = SimContext { showing: true, ..unprovisioned };
        assert_eq!(evaluate_sim_change(SimCondition::NotReady, &showing).action, SimAction::Reset);
    }

    #[test]
    fn perm_disabled_shows_or_resets() {
        assert_eq!(evaluate_sim_change(SimCondition::PermDisabled, &ctx()).action, SimAction::Show);
        let showing = SimContext { showing: true, ..ctx() };
        assert_eq!(evaluate_sim_change(SimCondition::PermDisabled, &showing).action, SimAction::Reset);
    }

    #[test]
    fn ready_is_ignored() {
        let ctx = SimContext { showing: true, ..ctx() };
        assert_eq!(evaluate_sim_change(SimCondition::Ready, &ctx).action, SimAction::Ignore);
    }
}
