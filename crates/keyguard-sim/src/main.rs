//! Keyguard simulator.
//!
//! Replays an event script against a mediator wired to simulated platform
//! collaborators and logs what happened.
//!
//! # Usage
//!
//! ```bash
//! keyguard-sim scripts/unlock_relock.kgs
//! keyguard-sim --insecure --no-instant-lock --log-level debug < events.kgs
//! ```

use std::{io, path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use keyguard_harness::TestBed;
use keyguard_sim::Runner;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keyguard-sim")]
#[command(about = "Replay a keyguard event script against a simulated device", long_about = None)]
struct Args {
    /// Script to replay; stdin when omitted
    script: Option<PathBuf>,

    /// Log bad lines and keep going
    #[arg(long)]
    keep_going: bool,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Start before system-ready and boot-completed
    #[arg(long)]
    cold: bool,

    /// Setup wizard not completed
    #[arg(long)]
    unprovisioned: bool,

    /// No secure credential
    #[arg(long)]
    insecure: bool,

    /// Power button does not lock instantly
    #[arg(long)]
    no_instant_lock: bool,

    /// Lock screen disabled in settings
    #[arg(long)]
    lock_screen_disabled: bool,

    /// Lock sounds off
    #[arg(long)]
    silent: bool,

    /// Face or voice unlock is the selected method
    #[arg(long)]
    weak_unlock: bool,

    /// Lock when the SIM is missing before setup
    #[arg(long)]
    require_sim: bool,

    /// Done-drawing rendezvous timeout
    #[arg(long, default_value_t = 2000)]
    done_drawing_timeout_ms: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    let bed = TestBed::builder()
        .knobs(|k| {
            k.provisioned = !args.unprovisioned;
            k.secure = !args.insecure;
            k.instant_lock = !args.no_instant_lock;
            k.lock_screen_disabled = args.lock_screen_disabled;
            k.lock_sounds = !args.silent;
            k.weak_unlock = args.weak_unlock;
        })
        .config(|c| {
            c.require_sim = args.require_sim;
            c.done_drawing_timeout = Duration::from_millis(args.done_drawing_timeout_ms);
        })
        .system_ready(!args.cold)
        .boot_completed(!args.cold)
        .build();
    let bed = match bed {
        Ok(bed) => bed,
        Err(e) => {
            error!(error = %e, "failed to start mediator");
            return ExitCode::FAILURE;
        },
    };

    let mut runner = Runner::new(bed).keep_going(args.keep_going);
    let result = match &args.script {
        Some(path) => runner.run_file(path),
        None => match io::read_to_string(io::stdin()) {
            Ok(source) => runner.run(&source),
            Err(e) => {
                error!(error = %e, "failed to read stdin");
                return ExitCode::FAILURE;
            },
        },
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "replay failed");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
