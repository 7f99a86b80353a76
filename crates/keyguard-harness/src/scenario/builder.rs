//! Scenario builder API.
//!
//! A scenario is a list of [`Step`]s applied to a fresh [`TestBed`], followed
//! by a mandatory oracle over the resulting [`World`].

use keyguard_mediator::MediatorConfig;

use super::{OracleFn, Step, World};
use crate::{platform::Knobs, testbed::TestBed};

/// Scenario builder.
///
/// Must call `.oracle()` to get a [`RunnableScenario`].
pub struct Scenario {
    name: String,
    knobs: Knobs,
    config: MediatorConfig,
    booted: bool,
    steps: Vec<Step>,
}

impl Scenario {
    /// New scenario on a booted, ready device with default knobs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            knobs: Knobs::default(),
            config: MediatorConfig::default(),
            booted: true,
            steps: Vec::new(),
        }
    }

    /// Start before "system ready" and "boot completed"; the steps must
    /// deliver them.
    #[must_use]
    pub fn cold(mut self) -> Self {
        self.booted = false;
        self
    }

    /// Adjust the starting knobs.
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

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps.
    #[must_use]
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Set the oracle and return a runnable scenario.
    ///
    /// The oracle is mandatory: a scenario cannot run without verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Apply every step, settle, and run the oracle.
    pub fn run(self) -> Result<(), String> {
        let Self { scenario, oracle } = self;
        let name = scenario.name;

        let bed = TestBed::builder()
            .knobs(|knobs| *knobs = scenario.knobs)
            .config(|config| *config = scenario.config)
            .system_ready(scenario.booted)
            .boot_completed(scenario.booted)
            .build()
            .map_err(|e| format!("Scenario '{name}': failed to start mediator: {e}"))?;

        for step in &scenario.steps {
            step.apply(&bed);
        }
        bed.settle();

        let world = World {
            snapshot: bed.snapshot(),
            effects: bed.platform.effects(),
            renderer_showing: bed.platform.renderer_showing(),
            wake_lock_held: bed.platform.wake_lock_held(),
            pending_alarms: bed.scheduler.pending(),
        };

        oracle(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}
