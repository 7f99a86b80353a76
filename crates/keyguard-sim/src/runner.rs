//! Script replay.

use std::{
    fs,
    path::{Path, PathBuf},
};

use keyguard_harness::TestBed;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::script::{Line, ScriptError, parse_line};

/// Replay failure.
#[derive(Debug, Error)]
pub enum RunError {
    /// A script line failed to parse and the runner is not keeping going.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The script file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Script path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Counts from one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Steps applied.
    pub steps: usize,
    /// Lines skipped because they failed to parse.
    pub skipped: usize,
    /// Host effects observed while replaying.
    pub effects: usize,
}

/// Replays scripts against a [`TestBed`].
pub struct Runner {
    bed: TestBed,
    keep_going: bool,
}

impl Runner {
    /// Runner over `bed`. Stops at the first bad line.
    pub fn new(bed: TestBed) -> Self {
        Self { bed, keep_going: false }
    }

    /// Log bad lines and carry on instead of stopping.
    #[must_use]
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// The bed being driven.
    pub fn bed(&self) -> &TestBed {
        &self.bed
    }

    /// Read and replay the script at `path`.
    pub fn run_file(&mut self, path: &Path) -> Result<Summary, RunError> {
        let source = fs::read_to_string(path)
            .map_err(|source| RunError::Read { path: path.to_path_buf(), source })?;
        self.run(&source)
    }

    /// Replay `source` line by line.
    ///
    /// Effects already recorded before the first line (boot) are counted
    /// with the first step that runs.
    pub fn run(&mut self, source: &str) -> Result<Summary, RunError> {
        let mut summary = Summary::default();

        for (index, text) in source.lines().enumerate() {
            let line = index + 1;
            match parse_line(line, text) {
                Ok(None) => {},
                Ok(Some(Line::Status)) => self.log_status(line),
                Ok(Some(Line::Step(step))) => {
                    step.apply(&self.bed);
                    summary.steps += 1;
                    summary.effects += self.drain_effects(line);
                },
                Err(e) if self.keep_going => {
                    warn!(error = %e, "skipping line");
                    summary.skipped += 1;
                },
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            steps = summary.steps,
            skipped = summary.skipped,
            effects = summary.effects,
            "script finished"
        );
        Ok(summary)
    }

    fn drain_effects(&self, line: usize) -> usize {
        let effects = self.bed.platform.take_effects();
        for effect in &effects {
            debug!(line, ?effect, "effect");
        }
        effects.len()
    }

    fn log_status(&self, line: usize) {
        let s = self.bed.snapshot();
        info!(
            line,
            at = ?self.bed.clock.elapsed(),
            phase = ?s.phase,
            showing = s.showing,
            occluded = s.occluded,
            enabled = s.externally_enabled,
            verify_pending = s.verify_pending,
            screen_on = s.screen_on,
            user = s.current_user,
            pending_alarms = self.bed.scheduler.pending(),
            "status"
        );
    }
}
