use std::process::ExitCode;

use keyboard_tracker::{
    CaptureState, ConsoleSink, LogSink, Tracker, TrackerConfig, TrackerResult, LOG_FILE,
    POLL_INTERVAL,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> TrackerResult<ExitCode> {
    let log = LogSink::open(LOG_FILE)?;
    let mut tracker = Tracker::new(TrackerConfig::default())?;

    tracker.subscribe(log);
    tracker.subscribe(ConsoleSink::stdio());
    tracker.start()?;

    let mut poll = tokio::time::interval(POLL_INTERVAL);

    while tracker.is_running() {
        tokio::select! {
            _ = poll.tick() => {}
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("interrupted");
                tracker.stop();
            }
        }
    }

    let state = tracker.join().await?;

    Ok(ExitCode::from(exit_status(state)))
}

/// Only a device that could not be opened is fatal; every other session ends successfully.
fn exit_status(state: CaptureState) -> u8 {
    match state {
        CaptureState::Error => 1,
        _ => 0,
    }
}
