use clap::Parser;
use log::LevelFilter;

use gcfflasher::cli::{self, Args};
use gcfflasher::config::Config;
use gcfflasher::engine::{Engine, Event, RunOutcome};
use gcfflasher::logging::initialize_logger;
use gcfflasher::serial_platform::SerialPlatform;

fn main() {
    let args = Args::parse();
    initialize_logger(verbosity_filter(args.verbose));

    let mut config = Config::load();

    let plan = match cli::plan_from_args(args, &config) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    };

    if !plan.device_path.is_empty() {
        config.default_port = Some(plan.device_path.clone());
        let _ = config.save();
    }

    let platform = SerialPlatform::new();
    let mut engine = Engine::new(
        platform,
        plan.task,
        plan.device_path,
        plan.file,
        plan.timeout_secs,
        plan.preferred_reset,
    );
    engine.start();
    let outcome = run_to_completion(&mut engine);

    std::process::exit(exit_code(&outcome));
}

/// Drives the run loop: polls the transport for bytes and elapsed timers,
/// feeding both into the engine, until it reports a [`RunOutcome`].
fn run_to_completion(engine: &mut Engine<SerialPlatform>) -> RunOutcome {
    loop {
        if let Some(outcome) = engine.outcome() {
            return outcome.clone();
        }

        match engine.platform_mut().poll_read() {
            Ok(Some(bytes)) => engine.on_bytes_received(&bytes),
            Ok(None) => {}
            Err(e) => {
                log::warn!("transport read failed: {e}");
                engine.handle_event(Event::Disconnected);
            }
        }

        if engine.platform_mut().poll_timeout() {
            engine.handle_event(Event::Timeout);
        }

        if let Some(outcome) = engine.outcome() {
            return outcome.clone();
        }
    }
}

fn verbosity_filter(count: u8) -> LevelFilter {
    match count {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn exit_code(outcome: &RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Completed => 0,
        RunOutcome::DeadlineExceeded => 2,
        RunOutcome::Failed(_) => 1,
    }
}
