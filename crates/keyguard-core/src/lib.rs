//! Keyguard decision core
//!
//! Pure decision logic for the lock-screen mediator, completely decoupled
//! from threads, timers and the renderer. Every function in this crate takes
//! a snapshot of its inputs and returns a value describing what should happen;
//! the mediator runtime is responsible for acting on it.
//!
//! # Components
//!
//! - [`decision`]: should the lock surface be shown right now?
//! - [`sim`]: how to react to a SIM state change
//! - [`lock_timeout`]: how long to wait before locking after screen-off
//! - [`status_bar`]: which status-bar affordances are disabled
//! - [`mod@env`]: clock abstraction
//! - [`error`]: rejection and collaborator error types

pub mod decision;
pub mod env;
pub mod error;
pub mod lock_timeout;
pub mod options;
pub mod sim;
pub mod status_bar;

pub use decision::{ShowDecision, ShowInputs, SkipReason, SubscriptionLock, evaluate_show_decision};
pub use env::{Clock, SystemClock};
pub use error::{CollaboratorError, RejectReason};
pub use lock_timeout::{LockTimeouts, delayed_lock_after};
pub use options::{ShowOptions, SurfaceVariant};
pub use sim::{BlockingDialog, SimAction, SimCondition, SimContext, SimOutcome, evaluate_sim_change};
pub use status_bar::{StatusBarFlags, StatusBarInputs};

/// Identifier of an Android-style user profile.
pub type UserId = u32;

/// Identifier of a SIM subscription.
pub type SubscriptionId = u64;

/// The device owner. Guest detection on user switch skips this user.
pub const PRIMARY_USER: UserId = 0;
