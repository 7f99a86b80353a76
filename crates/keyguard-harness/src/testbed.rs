//! A running mediator wired to the fakes.

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use keyguard_core::Clock;
use keyguard_mediator::{
    Collaborators, ExitCallback, Mediator, MediatorConfig, MediatorError, Renderer,
    SessionSnapshot, ShowCallback,
};

use crate::{
    clock::ManualClock,
    platform::{FakePlatform, FakeRenderer, Knobs, RecordingExitCallback, RecordingShowCallback},
    scheduler::ManualScheduler,
};

/// Fade duration the fake window manager passes to the exit animation.
pub const EXIT_FADE: Duration = Duration::from_millis(150);

/// Upper bound on executor/window-manager round trips in [`TestBed::settle`].
const SETTLE_ROUNDS: usize = 16;

/// Wraps the fake renderer before it is handed to the mediator.
pub type RendererWrapper = Box<dyn FnOnce(Box<dyn Renderer>) -> Box<dyn Renderer>>;

/// Mediator plus the doubles behind it.
///
/// The executor thread is real; time and alarms are manual. Dropping the bed
/// shuts the mediator down.
pub struct TestBed {
    /// The mediator under test.
    pub mediator: Mediator,
    /// Every collaborator except the renderer.
    pub platform: Arc<FakePlatform>,
    /// Time source.
    pub clock: Arc<ManualClock>,
    /// Alarm scheduler.
    pub scheduler: Arc<ManualScheduler>,
}

/// Configures a [`TestBed`].
pub struct TestBedBuilder {
    knobs: Knobs,
    config: MediatorConfig,
    system_ready: bool,
    boot_completed: bool,
    wrap: Option<RendererWrapper>,
}

impl TestBedBuilder {
    /// Adjust the platform knobs.
    #[must_use]
    pub fn knobs(mut self, f: impl FnOnce(&mut Knobs)) -> Self {
        f(&mut self.knobs);
        self
    }

    /// Adjust the mediator config.
    #[must_use]
    pub fn config(mut self, f: impl FnOnce(&mut MediatorConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Whether to deliver "system ready" before returning. Default on.
    #[must_use]
    pub fn system_ready(mut self, ready: bool) -> Self {
        self.system_ready = ready;
        self
    }

    /// Whether to deliver "boot completed" before returning. Default on.
    #[must_use]
    pub fn boot_completed(mut self, completed: bool) -> Self {
        self.boot_completed = completed;
        self
    }

    /// Decorate the fake renderer.
    #[must_use]
    pub fn wrap_renderer(
        mut self,
        wrap: impl FnOnce(Box<dyn Renderer>) -> Box<dyn Renderer> + 'static,
    ) -> Self {
        self.wrap = Some(Box::new(wrap));
        self
    }

    /// Start the mediator.
    pub fn build(self) -> Result<TestBed, MediatorError> {
        let platform = FakePlatform::new(self.knobs);
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)));

        let slot = Arc::new(OnceLock::new());
        let mut renderer: Box<dyn Renderer> =
            Box::new(FakeRenderer::new(Arc::clone(&platform), Arc::clone(&slot)));
        if let Some(wrap) = self.wrap {
            renderer = wrap(renderer);
        }

        let collaborators = Collaborators {
            renderer,
            update_monitor: platform.clone(),
            policy: platform.clone(),
            scheduler: scheduler.clone(),
            clock: clock.clone(),
            broadcaster: platform.clone(),
            status_bar: platform.clone(),
            sounds: platform.clone(),
            power: platform.clone(),
            dialogs: platform.clone(),
            activity_manager: platform.clone(),
            window_manager: platform.clone(),
            anti_theft: platform.clone(),
            power_off_alarm: platform.clone(),
            user_cache: platform.clone(),
        };

        let mediator = Mediator::start(self.config, collaborators)?;
        // Only the renderer holds this, so it goes away with the executor.
        let _ = slot.set(mediator.clone());

        let bed = TestBed { mediator, platform, clock, scheduler };
        if self.system_ready {
            bed.mediator.on_system_ready();
        }
        if self.boot_completed {
            bed.mediator.on_boot_completed();
        }
        bed.settle();
        Ok(bed)
    }
}

impl TestBed {
    /// Builder with default knobs and config, booted and ready.
    pub fn builder() -> TestBedBuilder {
        TestBedBuilder {
            knobs: Knobs::default(),
            config: MediatorConfig::default(),
            system_ready: true,
            boot_completed: true,
            wrap: None,
        }
    }

    /// Default bed.
    pub fn start() -> Result<Self, MediatorError> {
        Self::builder().build()
    }

    /// Drain the executor and let the fake window manager answer any
    /// "going away" request, until nothing more happens.
    pub fn settle(&self) {
        for _ in 0..SETTLE_ROUNDS {
            self.mediator.sync();
            if self.platform.knobs().auto_exit_animation && self.finish_exit() {
                continue;
            }
            // Commands posted by the executor itself land behind the barrier.
            if self.mediator.pending_commands() == 0 {
                return;
            }
        }
        tracing::warn!("test bed did not settle");
    }

    /// Answer a pending "going away" with the exit animation.
    ///
    /// Returns whether one was pending. Does not settle.
    pub fn finish_exit(&self) -> bool {
        if !self.platform.take_going_away() {
            return false;
        }
        self.mediator.start_keyguard_exit_animation(self.clock.now(), EXIT_FADE);
        true
    }

    /// Move time forward, fire due alarms, settle.
    pub fn advance(&self, by: Duration) -> usize {
        let fired = self.scheduler.advance(by);
        self.settle();
        fired
    }

    /// Atomic copy of the mediator state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.mediator.snapshot()
    }

    /// Fresh exit callback that logs its result.
    pub fn exit_callback(&self) -> Box<dyn ExitCallback> {
        RecordingExitCallback::boxed(&self.platform)
    }

    /// Fresh show callback that logs when fired.
    pub fn show_callback(&self) -> Box<dyn ShowCallback> {
        RecordingShowCallback::boxed(&self.platform)
    }
}

impl Drop for TestBed {
    fn drop(&mut self) {
        self.mediator.shutdown();
    }
}
