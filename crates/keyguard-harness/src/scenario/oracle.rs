//! Reusable oracles.

use keyguard_mediator::PresentationPhase;

use super::{OracleFn, World};
use crate::platform::Effect;

/// Every oracle must pass; reports the first failure.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world: &World| oracles.into_iter().try_for_each(|oracle| oracle(world)))
}

/// The session ended in `phase`.
pub fn phase(expected: PresentationPhase) -> OracleFn {
    Box::new(move |world: &World| {
        if world.phase() == expected {
            Ok(())
        } else {
            Err(format!("expected phase {expected:?}, got {:?}", world.phase()))
        }
    })
}

/// Session state and renderer agree on whether the surface is up.
pub fn renderer_agrees() -> OracleFn {
    Box::new(|world: &World| {
        if world.snapshot.showing == world.renderer_showing {
            Ok(())
        } else {
            Err(format!(
                "session showing={} but renderer showing={}",
                world.snapshot.showing, world.renderer_showing
            ))
        }
    })
}

/// `effect` happened.
pub fn saw(effect: Effect) -> OracleFn {
    Box::new(move |world: &World| {
        if world.saw(&effect) { Ok(()) } else { Err(format!("never saw {effect:?}")) }
    })
}

/// `effect` never happened.
pub fn never(effect: Effect) -> OracleFn {
    Box::new(move |world: &World| {
        if world.saw(&effect) { Err(format!("unexpectedly saw {effect:?}")) } else { Ok(()) }
    })
}

/// `effect` happened exactly `times` times.
pub fn count(effect: Effect, times: usize) -> OracleFn {
    Box::new(move |world: &World| {
        let seen = world.count(|e| *e == effect);
        if seen == times { Ok(()) } else { Err(format!("saw {effect:?} {seen} times, want {times}")) }
    })
}

/// The first `first` happened before the first `second`.
pub fn before(first: Effect, second: Effect) -> OracleFn {
    Box::new(move |world: &World| match (world.position(&first), world.position(&second)) {
        (Some(a), Some(b)) if a < b => Ok(()),
        (a, b) => Err(format!("{first:?} at {a:?} not before {second:?} at {b:?}")),
    })
}

/// Every wake-lock acquire was matched by a release.
pub fn wake_lock_balanced() -> OracleFn {
    Box::new(|world: &World| {
        if world.wake_lock_balance() == 0 && !world.wake_lock_held {
            Ok(())
        } else {
            Err(format!(
                "wake lock unbalanced: balance {}, held {}",
                world.wake_lock_balance(),
                world.wake_lock_held
            ))
        }
    })
}
