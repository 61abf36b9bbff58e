//! Per-thread request generation loop (spec §4.D). Each worker owns one
//! bound credential/bucket pair and independently decides when to stop:
//! whichever of the shutdown flag, the wall-clock deadline, the
//! per-thread request quota, or (in mixed mode) the total mixed-operation
//! quota is reached first wins.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::adapter;
use crate::classifier::{ErrorKind, OutcomeClass};
use crate::client::ObjectStoreClient;
use crate::config::{Config, ObjectSizeSpec, TestCase};
use crate::credentials::UserCredential;
use crate::pattern::Pattern;
use crate::trace::{ReqRecord, TraceWriter};

/// Per-thread counters. `Relaxed` atomics rather than a mutex: the monitor
/// samples these from another thread without synchronizing with the
/// worker, and an occasional stale read is acceptable for a live progress
/// line (spec §5).
#[derive(Default)]
pub struct ThreadStats {
    pub success_count: AtomicU64,
    pub fail_403_count: AtomicU64,
    pub fail_404_count: AtomicU64,
    pub fail_409_count: AtomicU64,
    pub fail_4xx_other_count: AtomicU64,
    pub fail_5xx_count: AtomicU64,
    pub fail_other_count: AtomicU64,
    pub fail_validation_count: AtomicU64,
    pub total_success_bytes: AtomicU64,
    pub total_latency_us: AtomicU64,
    pub max_latency_us: AtomicU64,
    pub min_latency_us: AtomicU64,
}

impl ThreadStats {
    pub fn new() -> Self {
        Self {
            min_latency_us: AtomicU64::new(u64::MAX),
            ..Default::default()
        }
    }

    fn record_latency(&self, us: u64) {
        self.total_latency_us.fetch_add(us, Ordering::Relaxed);
        self.max_latency_us.fetch_max(us, Ordering::Relaxed);
        self.min_latency_us.fetch_min(us, Ordering::Relaxed);
    }

    fn record_outcome(&self, class: OutcomeClass, bytes: u64, validation_failed: bool) {
        if validation_failed {
            self.fail_validation_count.fetch_add(1, Ordering::Relaxed);
            return;
        }
        match class {
            OutcomeClass::Success200 | OutcomeClass::Success204 | OutcomeClass::Success206 => {
                self.success_count.fetch_add(1, Ordering::Relaxed);
                self.total_success_bytes.fetch_add(bytes, Ordering::Relaxed);
            }
            OutcomeClass::Http403 => {
                self.fail_403_count.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeClass::Http404 => {
                self.fail_404_count.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeClass::Http409 => {
                self.fail_409_count.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeClass::Http400 => {
                self.fail_4xx_other_count.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeClass::Http500 => {
                self.fail_5xx_count.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeClass::Network0 => {
                self.fail_other_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Total requests dispatched so far (success + every failure kind),
    /// used both for the per-thread quota check and monitor progress math.
    pub fn total_requests(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
            + self.fail_403_count.load(Ordering::Relaxed)
            + self.fail_404_count.load(Ordering::Relaxed)
            + self.fail_409_count.load(Ordering::Relaxed)
            + self.fail_4xx_other_count.load(Ordering::Relaxed)
            + self.fail_5xx_count.load(Ordering::Relaxed)
            + self.fail_other_count.load(Ordering::Relaxed)
            + self.fail_validation_count.load(Ordering::Relaxed)
    }
}

/// Everything one worker thread needs that doesn't change over its
/// lifetime.
pub struct WorkerContext {
    pub worker_id: usize,
    pub config: Arc<Config>,
    pub user: UserCredential,
    pub bucket: String,
    pub client: Arc<dyn ObjectStoreClient>,
    pub pattern: Arc<Pattern>,
    pub shutdown: Arc<AtomicBool>,
    pub deadline: Option<Instant>,
    /// Shared with the caller so the monitor thread can sample progress
    /// while this worker is still running.
    pub stats: Arc<ThreadStats>,
}

/// Runs one worker to completion, accumulating into `ctx.stats` as it goes.
pub fn run(ctx: WorkerContext, trace_dir: Option<&Path>) {
    let stats = Arc::clone(&ctx.stats);
    let opts = adapter::build_request_options(&ctx.config, &ctx.bucket, &ctx.user);

    let mut trace = match trace_dir {
        Some(dir) if ctx.config.enable_detail_log => match TraceWriter::new(dir, ctx.worker_id) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!(worker_id = ctx.worker_id, error = %e, "failed to open trace file; continuing without one");
                None
            }
        },
        _ => None,
    };

    let start = Instant::now();
    let mix_total_quota = if ctx.config.use_mix_mode {
        Some(
            ctx.config.mix_ops.len() as u64
                * ctx.config.mix_loop_count.max(0) as u64
                * ctx.config.requests_per_thread.max(0) as u64,
        )
    } else {
        None
    };

    let mut k: u64 = 0;
    loop {
        if ctx.shutdown.load(Ordering::Relaxed) {
            debug!(worker_id = ctx.worker_id, "stopping: shutdown requested");
            break;
        }
        if let Some(deadline) = ctx.deadline {
            if Instant::now() >= deadline {
                debug!(worker_id = ctx.worker_id, "stopping: deadline reached");
                break;
            }
        }
        if ctx.config.run_seconds == 0 && ctx.config.requests_per_thread > 0 {
            if stats.total_requests() >= ctx.config.requests_per_thread as u64 {
                debug!(worker_id = ctx.worker_id, "stopping: per-thread quota reached");
                break;
            }
        }
        if let Some(quota) = mix_total_quota {
            if k >= quota {
                debug!(worker_id = ctx.worker_id, "stopping: mixed-mode quota reached");
                break;
            }
        }

        let op = current_op(&ctx.config, k);
        let key = build_key(&ctx.config, &ctx.user, ctx.worker_id, k);
        let object_size = sample_object_size(&ctx.config);

        let issued_at = Instant::now();
        let outcome = dispatch(&ctx, &opts, op, &key, object_size);
        let latency_us = issued_at.elapsed().as_micros() as u64;

        stats.record_latency(latency_us);
        stats.record_outcome(outcome.class, outcome.bytes, outcome.validation_failed);

        if let Some(writer) = trace.as_mut() {
            let rec = ReqRecord {
                timestamp_s: start.elapsed().as_secs_f64(),
                op_type: op.code(),
                key,
                latency_ms: latency_us as f64 / 1000.0,
                sdk_status: format!("{:?}", outcome.sdk_status),
                http_code: outcome.class.http_code(),
                bytes: outcome.bytes,
                request_id: outcome.request_id.unwrap_or_default(),
            };
            if let Err(e) = writer.record(rec) {
                warn!(worker_id = ctx.worker_id, error = %e, "trace write failed");
            }
        }

        k += 1;
    }

    if let Some(writer) = trace.as_mut() {
        let _ = writer.flush();
    }
}

fn current_op(config: &Config, k: u64) -> TestCase {
    if !config.use_mix_mode {
        return config.test_case;
    }
    let reqs_per_op = config.requests_per_thread.max(1) as u64;
    let op_count = config.mix_ops.len() as u64;
    if op_count == 0 {
        return config.test_case;
    }
    let slot = (k / reqs_per_op) % op_count;
    TestCase::from(config.mix_ops[slot as usize])
}

/// The per-object sequence within the current (loop, op): in mixed mode
/// this is the position within the current op's block of
/// `requests_per_thread` iterations, so that the same sequence value under
/// different ops of the same loop names the same object (enabling
/// PUT→GET→DELETE against one key); in single-case mode it's simply the
/// iteration index.
fn sequence_for(config: &Config, k: u64) -> u64 {
    if config.use_mix_mode {
        k % config.requests_per_thread.max(1) as u64
    } else {
        k
    }
}

fn build_key(config: &Config, user: &UserCredential, worker_id: usize, k: u64) -> String {
    let sequence = sequence_for(config, k);
    let base = format!(
        "{}-{}-{}-{}",
        user.username, config.key_prefix, worker_id, sequence
    );
    if config.obj_name_pattern_hash {
        let seed = worker_id as u64 + sequence;
        let hash = ((seed.wrapping_mul(1_103_515_245).wrapping_add(12_345)) & 0x7FFF_FFFF) % 10_000;
        format!("{hash:04}-{base}")
    } else {
        base
    }
}

fn sample_object_size(config: &Config) -> u64 {
    match config.object_size {
        ObjectSizeSpec::Fixed(n) => n.max(0) as u64,
        ObjectSizeSpec::Range { min, max } => {
            if min >= max {
                max.max(0) as u64
            } else {
                fastrand::u64((min.max(0) as u64)..=(max.max(0) as u64))
            }
        }
    }
}

fn dispatch(
    ctx: &WorkerContext,
    opts: &crate::client::RequestOptions,
    op: TestCase,
    key: &str,
    object_size: u64,
) -> adapter::OperationOutcome {
    match op {
        TestCase::Put => adapter::put_object(ctx.client.as_ref(), opts, key, object_size, &ctx.pattern),
        TestCase::Get => {
            let range = pick_range(&ctx.config, object_size);
            adapter::get_object(
                ctx.client.as_ref(),
                opts,
                key,
                range,
                &ctx.pattern,
                ctx.config.enable_data_validation,
            )
        }
        TestCase::Delete => adapter::delete_object(ctx.client.as_ref(), opts, key),
        TestCase::Multipart => adapter::multipart_upload(
            ctx.client.as_ref(),
            opts,
            key,
            object_size,
            ctx.config.part_size.max(0) as u64,
            &ctx.pattern,
        ),
        TestCase::Resumable => {
            let path = ctx.config.upload_file_path.as_deref().unwrap_or_default();
            adapter::upload_file(
                ctx.client.as_ref(),
                opts,
                key,
                Path::new(path),
                ctx.config.part_size.max(0) as u64,
                ctx.worker_id,
                path,
                ctx.config.enable_checkpoint,
            )
        }
        TestCase::Other(_) | TestCase::Mix => adapter::OperationOutcome {
            class: OutcomeClass::Http500,
            bytes: 0,
            request_id: None,
            validation_failed: false,
            sdk_status: ErrorKind::Other,
        },
    }
}

fn pick_range(config: &Config, object_size: u64) -> Option<(u64, Option<u64>)> {
    if config.range_options.is_empty() {
        return None;
    }
    let idx = fastrand::usize(..config.range_options.len());
    Some(adapter::resolve_range(config.range_options[idx], object_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::InMemoryClient;
    use crate::config::Config;

    fn context(mut config: Config) -> (WorkerContext, Arc<ThreadStats>) {
        config.endpoint = "obs.example.com".to_string();
        let stats = Arc::new(ThreadStats::new());
        let ctx = WorkerContext {
            worker_id: 0,
            config: Arc::new(config),
            user: UserCredential {
                username: "alice".to_string(),
                access_key: "AK".to_string(),
                secret_key: "SK".to_string(),
                session_token: None,
                original_access_key: "AK".to_string(),
            },
            bucket: "bucket".to_string(),
            client: Arc::new(InMemoryClient::new()),
            pattern: Arc::new(Pattern::canonical()),
            shutdown: Arc::new(AtomicBool::new(false)),
            deadline: None,
            stats: Arc::clone(&stats),
        };
        (ctx, stats)
    }

    #[test]
    fn stops_at_requests_per_thread_quota() {
        let mut config = Config::default();
        config.requests_per_thread = 5;
        config.test_case = TestCase::Put;
        let (ctx, stats) = context(config);

        run(ctx, None);
        assert_eq!(stats.total_requests(), 5);
        assert_eq!(stats.success_count.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn stops_immediately_when_shutdown_flag_is_set() {
        let mut config = Config::default();
        config.requests_per_thread = 1000;
        let (ctx, stats) = context(config);
        ctx.shutdown.store(true, Ordering::Relaxed);

        run(ctx, None);
        assert_eq!(stats.total_requests(), 0);
    }

    #[test]
    fn mixed_mode_cycles_ops_in_blocks_of_requests_per_thread() {
        let mut config = Config::default();
        config.use_mix_mode = true;
        config.test_case = TestCase::Mix;
        config.mix_ops = vec![201, 204];
        config.requests_per_thread = 2;
        config.mix_loop_count = 1;
        let (ctx, stats) = context(config);

        run(ctx, None);
        // 2 PUTs then 2 DELETEs, same sequence values in both blocks so
        // each DELETE targets the key its matching PUT just created.
        assert_eq!(stats.total_requests(), 4);
        assert_eq!(stats.success_count.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn latency_bounds_are_recorded() {
        let mut config = Config::default();
        config.requests_per_thread = 3;
        let (ctx, stats) = context(config);

        run(ctx, None);
        assert!(stats.min_latency_us.load(Ordering::Relaxed) <= stats.max_latency_us.load(Ordering::Relaxed));
        assert!(stats.total_latency_us.load(Ordering::Relaxed) > 0 || stats.max_latency_us.load(Ordering::Relaxed) == 0);
    }

    #[test]
    fn object_name_pattern_hash_changes_key_shape() {
        let mut config = Config::default();
        config.obj_name_pattern_hash = true;
        config.key_prefix = "p".to_string();
        let key = build_key(&config, &UserCredential {
            username: "bob".to_string(),
            access_key: "AK".to_string(),
            secret_key: "SK".to_string(),
            session_token: None,
            original_access_key: "AK".to_string(),
        }, 2, 7);
        // seed = worker_id(2) + sequence(7) = 9;
        // (9*1103515245 + 12345) & 0x7FFFFFFF % 10000 = 4958
        assert_eq!(key, "4958-bob-p-2-7");
    }

    #[test]
    fn non_hash_key_is_a_pure_function_of_worker_id_and_sequence() {
        let mut config = Config::default();
        config.key_prefix = "p".to_string();
        let user = UserCredential {
            username: "bob".to_string(),
            access_key: "AK".to_string(),
            secret_key: "SK".to_string(),
            session_token: None,
            original_access_key: "AK".to_string(),
        };
        assert_eq!(build_key(&config, &user, 2, 0), "bob-p-2-0");
        assert_eq!(build_key(&config, &user, 2, 1), "bob-p-2-1");
    }
}
