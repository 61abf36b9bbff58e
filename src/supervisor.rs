//! Orchestration: loads configuration and credentials, derives each
//! tenant's bucket name, spawns one worker thread per `(user, thread)`
//! pair plus the monitor thread, then aggregates and writes the final
//! report (spec §4.G).
//!
//! SIGPIPE is left at its Rust-default disposition (ignored) rather than
//! reset explicitly here — std already does this for every Rust binary on
//! unix, unlike the C tool this was built against, which had to do it by
//! hand.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::client::ObjectStoreClient;
use crate::config::Config;
use crate::credentials::{self, CredentialsError, UserCredential};
use crate::monitor;
use crate::pattern::Pattern;
use crate::report::{BenchmarkReport, Totals};
use crate::worker::{self, ThreadStats, WorkerContext};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to create task log directory {path}: {source}")]
    CreateLogDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("temporary-token command failed: {0}")]
    TempTokenCommand(String),
    #[error(transparent)]
    Report(#[from] std::io::Error),
}

/// Bucket-name derivation policy: a fixed name wins outright; otherwise
/// combine the lower-cased access key with the configured prefix, falling
/// back to a sentinel name when neither is present (spec §4.G).
pub fn derive_bucket_name(config: &Config, user: &UserCredential) -> String {
    if !config.bucket_name_fixed.is_empty() {
        return config.bucket_name_fixed.clone();
    }

    let ak_lower = user.original_access_key.to_lowercase();
    match (ak_lower.is_empty(), config.bucket_name_prefix.is_empty()) {
        (false, false) => format!("{ak_lower}.{}", config.bucket_name_prefix),
        (true, false) => config.bucket_name_prefix.clone(),
        (false, true) => ak_lower,
        (true, true) => "default-bench-bucket".to_string(),
    }
}

/// Creates `logs/task_<timestamp>` and returns its path.
pub fn create_task_log_dir(base: &Path, now: i64) -> Result<PathBuf, SupervisorError> {
    fs_create_all(base)?;
    let stamp = time_format::strftime_utc("%Y%m%d_%H%M%S", now).unwrap_or_else(|_| "UNKNOWN".to_string());
    let dir = base.join(format!("task_{stamp}"));
    fs_create_all(&dir)?;
    Ok(dir)
}

fn fs_create_all(path: &Path) -> Result<(), SupervisorError> {
    std::fs::create_dir_all(path).map_err(|source| SupervisorError::CreateLogDir {
        path: path.display().to_string(),
        source,
    })
}

/// Loads the users file appropriate to `config.is_temporary_token`,
/// shelling out to the configured token-minting command first when
/// enabled. This step runs before the timed portion of the benchmark
/// starts, matching the original tool's "don't let credential setup count
/// against throughput numbers" behavior.
pub fn load_credentials(config: &Config) -> Result<Vec<UserCredential>, SupervisorError> {
    if config.is_temporary_token {
        info!("IsTemporaryToken enabled, fetching STS tokens");
        let status = Command::new("sh")
            .arg("-c")
            .arg(&config.temp_token_command)
            .status()
            .map_err(|e| SupervisorError::TempTokenCommand(e.to_string()))?;
        if !status.success() {
            return Err(SupervisorError::TempTokenCommand(format!(
                "command exited with {status}"
            )));
        }
        Ok(credentials::load_users_file(
            Path::new("temptoken.dat"),
            true,
            config.target_user_count as usize,
        )?)
    } else {
        Ok(credentials::load_users_file(
            Path::new("users.dat"),
            false,
            config.target_user_count as usize,
        )?)
    }
}

/// Two-stage Ctrl-C handling: the first signal requests graceful shutdown;
/// a second forces an immediate exit in case a worker is stuck in a call
/// that never returns.
pub fn install_shutdown_handler(shutdown: Arc<AtomicBool>) {
    let hits = AtomicU32::new(0);
    ctrlc::set_handler(move || {
        let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
        if n == 1 {
            warn!("received interrupt (1/2); shutting down gracefully, press Ctrl-C again to force quit");
            shutdown.store(true, Ordering::SeqCst);
        } else {
            error!("received interrupt (2/2); force quitting");
            std::process::exit(1);
        }
    })
    .expect("failed to install Ctrl-C handler");
}

/// Runs one complete benchmark: spawns workers and the monitor, waits for
/// them, and writes the final report into `log_dir`.
pub fn execute(
    config: Arc<Config>,
    users: Vec<UserCredential>,
    client: Arc<dyn ObjectStoreClient>,
    log_dir: &Path,
    shutdown: Arc<AtomicBool>,
) -> Result<BenchmarkReport, SupervisorError> {
    let pattern = Arc::new(Pattern::canonical());
    let deadline = (config.run_seconds > 0)
        .then(|| Instant::now() + Duration::from_secs(config.run_seconds as u64));

    let mut handles = Vec::new();
    let mut all_stats: Vec<Arc<ThreadStats>> = Vec::new();
    let mut worker_id = 0usize;

    let start = Instant::now();

    for user in &users {
        let bucket = derive_bucket_name(&config, user);
        for _ in 0..config.threads_per_user.max(1) {
            let stats = Arc::new(ThreadStats::new());
            all_stats.push(Arc::clone(&stats));
            let ctx = WorkerContext {
                worker_id,
                config: Arc::clone(&config),
                user: user.clone(),
                bucket: bucket.clone(),
                client: Arc::clone(&client),
                pattern: Arc::clone(&pattern),
                shutdown: Arc::clone(&shutdown),
                deadline,
                stats,
            };
            let log_dir = log_dir.to_path_buf();
            let handle = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || worker::run(ctx, Some(&log_dir)))
                .expect("failed to spawn worker thread");
            handles.push(handle);
            worker_id += 1;
        }
    }

    let monitor_stop = Arc::new(AtomicBool::new(false));
    let monitor_handle = {
        let config = Arc::clone(&config);
        let log_dir = log_dir.to_path_buf();
        let monitor_stop = Arc::clone(&monitor_stop);
        let stats_for_monitor = all_stats.clone();
        thread::Builder::new()
            .name("monitor".to_string())
            .spawn(move || {
                let _ = monitor::run(&config, &stats_for_monitor, &log_dir, &monitor_stop, monitor::DEFAULT_INTERVAL);
            })
            .expect("failed to spawn monitor thread")
    };

    for handle in handles {
        if let Err(e) = handle.join() {
            error!("worker thread panicked: {:?}", e);
        }
    }

    monitor_stop.store(true, Ordering::SeqCst);
    let _ = monitor_handle.join();

    let actual_duration_secs = start.elapsed().as_secs_f64();
    let totals = aggregate(&all_stats);
    let total_threads = worker_id as u32;

    let report = BenchmarkReport::new(&config, users.len() as u32, total_threads, totals, actual_duration_secs);
    report.write_to_dir(log_dir)?;

    if shutdown.load(Ordering::Relaxed) {
        warn!("benchmark interrupted by user (graceful stop)");
    }

    Ok(report)
}

fn aggregate(all_stats: &[Arc<ThreadStats>]) -> Totals {
    let mut totals = Totals::default();
    for s in all_stats {
        totals.success += s.success_count.load(Ordering::Relaxed);
        totals.fail_403 += s.fail_403_count.load(Ordering::Relaxed);
        totals.fail_404 += s.fail_404_count.load(Ordering::Relaxed);
        totals.fail_409 += s.fail_409_count.load(Ordering::Relaxed);
        totals.fail_4xx_other += s.fail_4xx_other_count.load(Ordering::Relaxed);
        totals.fail_5xx += s.fail_5xx_count.load(Ordering::Relaxed);
        totals.fail_other += s.fail_other_count.load(Ordering::Relaxed);
        totals.fail_validation += s.fail_validation_count.load(Ordering::Relaxed);
        totals.total_success_bytes += s.total_success_bytes.load(Ordering::Relaxed);
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(ak: &str) -> UserCredential {
        UserCredential {
            username: "alice".to_string(),
            access_key: ak.to_string(),
            secret_key: "SK".to_string(),
            session_token: None,
            original_access_key: ak.to_string(),
        }
    }

    #[test]
    fn fixed_bucket_name_wins_outright() {
        let mut config = Config::default();
        config.bucket_name_fixed = "fixed-bucket".to_string();
        config.bucket_name_prefix = "prefix".to_string();
        assert_eq!(derive_bucket_name(&config, &user("AK1")), "fixed-bucket");
    }

    #[test]
    fn ak_and_prefix_combine_when_both_present() {
        let mut config = Config::default();
        config.bucket_name_prefix = "bench".to_string();
        assert_eq!(derive_bucket_name(&config, &user("AK1")), "ak1.bench");
    }

    #[test]
    fn prefix_alone_when_ak_missing() {
        let mut config = Config::default();
        config.bucket_name_prefix = "bench".to_string();
        assert_eq!(derive_bucket_name(&config, &user("")), "bench");
    }

    #[test]
    fn ak_alone_when_prefix_missing() {
        let config = Config::default();
        assert_eq!(derive_bucket_name(&config, &user("AK1")), "ak1");
    }

    #[test]
    fn sentinel_when_neither_present() {
        let config = Config::default();
        assert_eq!(derive_bucket_name(&config, &user("")), "default-bench-bucket");
    }

    #[test]
    fn task_log_dir_is_timestamped_and_created() {
        let base = tempfile::tempdir().unwrap();
        let dir = create_task_log_dir(base.path(), 1_700_000_000).unwrap();
        assert!(dir.exists());
        assert!(dir.file_name().unwrap().to_str().unwrap().starts_with("task_"));
    }
}
