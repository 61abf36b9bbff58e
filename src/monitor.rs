//! Background sampler thread: periodically reads every worker's stats,
//! prints a progress line, and appends a row to `realtime.txt` (spec §4.F).
//! Sleeps in 100ms steps rather than one long sleep so shutdown is
//! responsive even with a multi-second interval.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::config::Config;
use crate::worker::ThreadStats;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);
const SLEEP_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default)]
pub struct Sample {
    pub elapsed_secs: f64,
    pub progress_pct: Option<f64>,
    pub cumulative_tps: f64,
    pub cumulative_throughput_mbps: f64,
    pub success_rate_pct: f64,
    pub total_requests: u64,
}

fn expected_total_requests(config: &Config, thread_count: u64) -> Option<u64> {
    let reqs_per_op = config.requests_per_thread.max(0) as u64;
    if config.use_mix_mode {
        let count = thread_count
            * config.mix_ops.len() as u64
            * config.mix_loop_count.max(0) as u64
            * reqs_per_op.max(1);
        (count > 0).then_some(count)
    } else if reqs_per_op > 0 {
        Some(thread_count * reqs_per_op)
    } else {
        None
    }
}

fn sample(config: &Config, stats: &[Arc<ThreadStats>], start: Instant) -> Sample {
    let mut success = 0u64;
    let mut bytes = 0u64;
    let mut fail = 0u64;

    for s in stats {
        success += s.success_count.load(Ordering::Relaxed);
        bytes += s.total_success_bytes.load(Ordering::Relaxed);
        fail += s.fail_403_count.load(Ordering::Relaxed)
            + s.fail_404_count.load(Ordering::Relaxed)
            + s.fail_409_count.load(Ordering::Relaxed)
            + s.fail_4xx_other_count.load(Ordering::Relaxed)
            + s.fail_5xx_count.load(Ordering::Relaxed)
            + s.fail_other_count.load(Ordering::Relaxed)
            + s.fail_validation_count.load(Ordering::Relaxed);
    }

    let total = success + fail;
    let elapsed = start.elapsed().as_secs_f64();

    let progress_pct = if config.run_seconds > 0 {
        Some((elapsed / config.run_seconds as f64 * 100.0).min(100.0))
    } else {
        expected_total_requests(config, stats.len() as u64)
            .map(|expected| (total as f64 / expected as f64 * 100.0).min(100.0))
    };

    Sample {
        elapsed_secs: elapsed,
        progress_pct,
        cumulative_tps: if elapsed > 0.0 { total as f64 / elapsed } else { 0.0 },
        cumulative_throughput_mbps: if elapsed > 0.0 {
            (bytes as f64 / 1024.0 / 1024.0) / elapsed
        } else {
            0.0
        },
        success_rate_pct: if total > 0 { success as f64 / total as f64 * 100.0 } else { 0.0 },
        total_requests: total,
    }
}

/// Runs the monitor loop until `stop` is set, writing `realtime.txt` into
/// `log_dir`. Returns once `stop` flips or an unrecoverable I/O error
/// occurs opening the output file.
pub fn run(
    config: &Config,
    stats: &[Arc<ThreadStats>],
    log_dir: &Path,
    stop: &AtomicBool,
    interval: Duration,
) -> io::Result<()> {
    let mut file = File::create(log_dir.join("realtime.txt"))?;
    writeln!(
        file,
        "RunTime(s),Process(%),Cumul_TPS,Cumul_BW(MB/s),Success_Rate(%),Total_Reqs"
    )?;
    file.flush()?;

    let start = Instant::now();
    let steps_per_interval = (interval.as_millis() / SLEEP_STEP.as_millis()).max(1) as u32;

    while !stop.load(Ordering::Relaxed) {
        for _ in 0..steps_per_interval {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }
            thread::sleep(SLEEP_STEP);
        }

        let s = sample(config, stats, start);
        match s.progress_pct {
            Some(pct) => info!(
                "RunTime: {:8.1}s | Process: {:6.2}% | Cumul TPS: {:8.2} | Cumul BW: {:8.2} MB/s | Success Rate: {:7.3}% | Total Reqs: {}",
                s.elapsed_secs, pct, s.cumulative_tps, s.cumulative_throughput_mbps, s.success_rate_pct, s.total_requests
            ),
            None => info!(
                "RunTime: {:8.1}s | Process:    N/A | Cumul TPS: {:8.2} | Cumul BW: {:8.2} MB/s | Success Rate: {:7.3}% | Total Reqs: {}",
                s.elapsed_secs, s.cumulative_tps, s.cumulative_throughput_mbps, s.success_rate_pct, s.total_requests
            ),
        }

        writeln!(
            file,
            "{:.1},{:.2},{:.2},{:.2},{:.3},{}",
            s.elapsed_secs,
            s.progress_pct.unwrap_or(0.0),
            s.cumulative_tps,
            s.cumulative_throughput_mbps,
            s.success_rate_pct,
            s.total_requests
        )?;
        file.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering as O;

    fn stats_with(success: u64, bytes: u64) -> Arc<ThreadStats> {
        let s = Arc::new(ThreadStats::new());
        s.success_count.store(success, O::Relaxed);
        s.total_success_bytes.store(bytes, O::Relaxed);
        s
    }

    #[test]
    fn progress_pct_uses_run_seconds_when_time_limited() {
        let mut config = Config::default();
        config.run_seconds = 100;
        let stats = vec![stats_with(10, 0)];
        let start = Instant::now() - Duration::from_secs(50);
        let s = sample(&config, &stats, start);
        assert!(s.progress_pct.unwrap() > 40.0 && s.progress_pct.unwrap() < 60.0);
    }

    #[test]
    fn progress_pct_falls_back_to_expected_total_when_untimed() {
        let mut config = Config::default();
        config.requests_per_thread = 20;
        let stats = vec![stats_with(10, 0)];
        let start = Instant::now() - Duration::from_secs(1);
        let s = sample(&config, &stats, start);
        assert_eq!(s.progress_pct, Some(50.0));
    }

    #[test]
    fn progress_pct_is_none_when_no_basis_exists() {
        let config = Config::default();
        let stats = vec![stats_with(10, 0)];
        let start = Instant::now() - Duration::from_secs(1);
        let s = sample(&config, &stats, start);
        assert_eq!(s.progress_pct, None);
    }

    #[test]
    fn progress_pct_caps_at_100() {
        let mut config = Config::default();
        config.run_seconds = 10;
        let stats = vec![stats_with(0, 0)];
        let start = Instant::now() - Duration::from_secs(1000);
        let s = sample(&config, &stats, start);
        assert_eq!(s.progress_pct, Some(100.0));
    }

    #[test]
    fn run_writes_header_immediately() {
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let stop = AtomicBool::new(true);
        run(&config, &[], dir.path(), &stop, Duration::from_millis(100)).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("realtime.txt")).unwrap();
        assert!(contents.starts_with("RunTime(s),Process(%)"));
    }
}
