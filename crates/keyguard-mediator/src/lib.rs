//! Keyguard mediator runtime
//!
//! Coordinates the lock surface between many caller threads and one UI
//! executor. Callers (screen, telephony, window manager, apps) invoke the
//! [`Mediator`] from any thread; each call updates the session state under a
//! single lock and posts commands to a FIFO queue. One dedicated thread owns
//! the [`Renderer`] and applies those commands in order.
//!
//! # Architecture
//!
//! Decisions (should the surface show, how to react to a SIM report, how long
//! to wait before locking) are pure functions in `keyguard-core`. This crate
//! gathers their inputs from the collaborators, acts on the result, and owns
//! everything with a thread or a clock attached to it.
//!
//! Every platform service is a constructor-injected trait object
//! ([`Collaborators`]); there is no global lookup. Tests substitute recording
//! doubles for all of them.
//!
//! # Components
//!
//! - [`collaborators`]: capability traits the mediator consumes
//! - [`config`]: tunables
//! - [`state`]: session state and its snapshot
//! - [`timer`]: tokio-backed [`AlarmScheduler`]
//! - [`Mediator`]: intake, queries and lifecycle

pub mod collaborators;
pub mod config;
mod intake;
mod mediator;
mod presentation;
mod queue;
pub mod state;
pub mod timer;

pub use collaborators::{
    ActivityManager, AlarmFn, AlarmScheduler, AnimationDone, AntiTheft, Broadcaster, CallbackId,
    CollaboratorResult, Collaborators, DialogManager, ExitCallback, PolicySource, PowerManager,
    PowerOffAlarm, Renderer, ScreenOffReason, ShowCallback, Sound, SoundPlayer, StatusBar,
    UpdateMonitor, UpdateMonitorCallback, UserCache, WindowManager,
};
pub use config::MediatorConfig;
pub use mediator::{Mediator, MediatorError};
pub use state::{PresentationPhase, SessionSnapshot};
pub use timer::TokioScheduler;
