//! Binary entry point: parses arguments, loads configuration and
//! credentials, then hands off to the supervisor.

use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use obs_bench::args::Args;
use obs_bench::client::mock::InMemoryClient;
use obs_bench::config;
use obs_bench::logging;
use obs_bench::supervisor;

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match config::load_config(std::path::Path::new(args.config_path())) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config {}: {e}", args.config_path());
            return ExitCode::FAILURE;
        }
    };

    if let Some(code) = args.test_case_override() {
        config.test_case = code.into();
    }

    logging::init(config.log_level, args.verbose, args.quiet);

    let config = Arc::new(config);

    let users = match supervisor::load_credentials(&config) {
        Ok(u) if !u.is_empty() => u,
        Ok(_) => {
            error!("no credentials loaded; check users.dat/temptoken.dat");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("failed to load credentials: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_dir = match supervisor::create_task_log_dir(
        std::path::Path::new("logs"),
        time_format::from_system_time(std::time::SystemTime::now()).unwrap_or(0),
    ) {
        Ok(dir) => dir,
        Err(e) => {
            error!("failed to create task log directory: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(dir = %log_dir.display(), "writing logs and report to task directory");

    let shutdown = Arc::new(AtomicBool::new(false));
    supervisor::install_shutdown_handler(Arc::clone(&shutdown));

    let client: Arc<dyn obs_bench::client::ObjectStoreClient> = Arc::new(InMemoryClient::new());

    match supervisor::execute(config, users, client, &log_dir, shutdown) {
        Ok(report) => {
            info!(
                tps = report.tps,
                throughput_mbps = report.throughput_mbps,
                "benchmark complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("benchmark run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
