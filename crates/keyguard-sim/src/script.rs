//! Script parsing.
//!
//! One event per line; `#` starts a comment. Each line parses into a
//! [`Line`]: either a harness [`Step`] or a request to log the session state.

use std::time::Duration;

use keyguard_core::{ShowOptions, SimCondition, SubscriptionId, SurfaceVariant, UserId};
use keyguard_harness::{
    SimSlot,
    scenario::{Knob, Step},
};
use keyguard_mediator::ScreenOffReason;
use thiserror::Error;

/// A parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Apply a step.
    Step(Step),
    /// Log the current session snapshot.
    Status,
}

/// A line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The command word is not recognised.
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand {
        /// 1-based line number.
        line: usize,
        /// The unrecognised word.
        command: String,
    },

    /// The command is known but its arguments are wrong.
    #[error("line {line}: {command}: {error}")]
    InvalidArgs {
        /// 1-based line number.
        line: usize,
        /// Command name.
        command: String,
        /// What was wrong.
        error: String,
    },
}

/// Parse one line. Blank lines and comments yield `Ok(None)`.
pub fn parse_line(line: usize, input: &str) -> Result<Option<Line>, ScriptError> {
    let input = input.split_once('#').map_or(input, |(code, _)| code);
    let parts: Vec<&str> = input.split_whitespace().collect();
    let Some((&command, args)) = parts.split_first() else {
        return Ok(None);
    };
    let invalid = |error: &str| ScriptError::InvalidArgs {
        line,
        command: command.to_string(),
        error: error.to_string(),
    };

    let step = match command {
        "system-ready" => Step::SystemReady,
        "boot-completed" => Step::BootCompleted,
        "screen-on" => Step::ScreenOn,
        "verify" => Step::Verify,
        "dismiss" => Step::Dismiss,
        "exit-animation" => Step::ExitAnimation,
        "biometric" => Step::Biometric,
        "status" => return Ok(Some(Line::Status)),

        "screen-off" => {
            let reason = match args {
                ["user"] => ScreenOffReason::User,
                ["timeout"] => ScreenOffReason::Timeout,
                ["prox"] => ScreenOffReason::ProximitySensor,
                ["admin"] => ScreenOffReason::Admin,
                _ => return Err(invalid("Usage: screen-off <user|timeout|prox|admin>")),
            };
            Step::ScreenOff(reason)
        },

        "dream" => match args {
            ["start"] => Step::DreamStart,
            ["stop"] => Step::DreamStop,
            _ => return Err(invalid("Usage: dream <start|stop>")),
        },

        "enable" => {
            Step::Enable(on_off(args).ok_or_else(|| invalid("Usage: enable <on|off>"))?)
        },

        "done" => match args {
            ["auth"] => Step::Done { authenticated: true },
            ["cancel"] => Step::Done { authenticated: false },
            _ => return Err(invalid("Usage: done <auth|cancel>")),
        },

        "timeout" => {
            let variant = match args {
                [] => None,
                ["default"] => Some(SurfaceVariant::Default),
                ["bouncer"] => Some(SurfaceVariant::Bouncer),
                ["alarm"] => Some(SurfaceVariant::Alarm),
                _ => return Err(invalid("Usage: timeout [default|bouncer|alarm]")),
            };
            Step::Timeout(variant.map(ShowOptions::with_variant))
        },

        "sim" => parse_sim(args).ok_or_else(|| {
            invalid(
                "Usage: sim <sub> <not-ready|absent|pin|puk|network|perm-disabled|ready> [retries]",
            )
        })?,

        "occlude" => {
            Step::Occlude(on_off(args).ok_or_else(|| invalid("Usage: occlude <on|off>"))?)
        },

        "advance" => match args {
            [ms] => {
                let ms: u64 = ms.parse().map_err(|_| invalid("Invalid milliseconds"))?;
                Step::Advance(Duration::from_millis(ms))
            },
            _ => return Err(invalid("Usage: advance <ms>")),
        },

        "user-switch" => {
            Step::UserSwitching(user(args).ok_or_else(|| invalid("Usage: user-switch <id>"))?)
        },
        "user-switched" => {
            Step::UserSwitched(user(args).ok_or_else(|| invalid("Usage: user-switched <id>"))?)
        },

        "phone" => match args {
            ["idle"] => Step::PhoneIdle(true),
            ["busy"] => Step::PhoneIdle(false),
            _ => return Err(invalid("Usage: phone <idle|busy>")),
        },

        "dock" => match args {
            ["desk"] => Step::Dock(true),
            ["off"] => Step::Dock(false),
            _ => return Err(invalid("Usage: dock <desk|off>")),
        },

        "set" => match args {
            [name, value] => {
                let knob = Knob::from_name(name).ok_or_else(|| invalid("Unknown knob"))?;
                let on = on_off(&[*value]).ok_or_else(|| invalid("Usage: set <knob> <on|off>"))?;
                Step::Set(knob, on)
            },
            _ => return Err(invalid("Usage: set <knob> <on|off>")),
        },

        _ => return Err(ScriptError::UnknownCommand { line, command: command.to_string() }),
    };

    Ok(Some(Line::Step(step)))
}

fn on_off(args: &[&str]) -> Option<bool> {
    match args {
        ["on"] => Some(true),
        ["off"] => Some(false),
        _ => None,
    }
}

fn user(args: &[&str]) -> Option<UserId> {
    match args {
        [id] => id.parse().ok(),
        _ => None,
    }
}

fn sim_condition(name: &str) -> Option<SimCondition> {
    let condition = match name {
        "not-ready" => SimCondition::NotReady,
        "absent" => SimCondition::Absent,
        "pin" => SimCondition::PinRequired,
        "puk" => SimCondition::PukRequired,
        "network" => SimCondition::NetworkLocked,
        "perm-disabled" => SimCondition::PermDisabled,
        "ready" => SimCondition::Ready,
        _ => return None,
    };
    Some(condition)
}

/// `sim <sub> <condition> [retries]`. Retries apply to the PUK, or to the
/// network unlock for `network`.
fn parse_sim(args: &[&str]) -> Option<Step> {
    let (sub, condition, retries) = match args {
        [sub, condition] => (sub, condition, None),
        [sub, condition, retries] => (sub, condition, Some(retries.parse::<u32>().ok()?)),
        _ => return None,
    };
    let sub: SubscriptionId = sub.parse().ok()?;
    let condition = sim_condition(condition)?;

    let mut slot = SimSlot::new(condition);
    if condition == SimCondition::NetworkLocked {
        slot.me_retries = retries;
    } else {
        slot.puk_retries = retries;
    }
    Some(Step::Sim(sub, slot))
}
