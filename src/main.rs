use clap::Parser;
use ruuvi_gateway::TagFilter;
use ruuvi_gateway::app::{self, Options, RealScanner};
use std::panic::{self, PanicHookInfo};
use tracing_subscriber::EnvFilter;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Log to stderr; stdout may be carrying line protocol.
fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd, Telegraf execd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    init_logging(options.log_level());

    let filter = TagFilter::new(options.tags.iter().copied());
    let writers = options
        .sinks
        .iter()
        .map(|target| (target.to_string(), target.writer()))
        .collect();

    match app::run(options, &RealScanner, &filter, writers).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            tracing::error!(error = %why, "gateway stopped");
            std::process::exit(EXIT_ERROR);
        }
    }
}
