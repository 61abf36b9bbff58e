//! The `key=value` configuration file format and the in-memory [`Config`]
//! it populates (spec §3, §6).

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::client::Transport;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open config file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid ObjectSize range: min {min} > max {max}")]
    InvalidObjectSizeRange { min: i64, max: i64 },
    #[error("'Users' must be greater than 0")]
    MissingUserCount,
    #[error("Protocol MUST be 'https' when MutualSslSwitch or GmModeSwitch is enabled")]
    SecureProtocolRequired,
    #[error(
        "ServerCertPath, ClientSignCertPath, and ClientSignKeyPath MUST be configured \
         when MutualSslSwitch is true"
    )]
    IncompleteMutualSslPaths,
    #[error(
        "ServerCertPath, ClientEncCertPath, and ClientEncKeyPath MUST be configured \
         when GmModeSwitch is true"
    )]
    IncompleteGmModePaths,
    #[error("invalid integer for key {key}: {value}")]
    InvalidInteger { key: String, value: String },
}

/// The `TestCase` selector. `Mix` (900) activates the mixed-operation
/// generator regardless of which single-op value `test_case` also holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCase {
    Put,
    Get,
    Delete,
    Multipart,
    Resumable,
    Mix,
    /// Any numeric value not covered above is kept verbatim so a config
    /// file that only ever uses it for mixed-mode composition doesn't fail
    /// to load; the worker rejects it if actually dispatched standalone.
    Other(i32),
}

impl TestCase {
    pub fn code(self) -> i32 {
        match self {
            TestCase::Put => 201,
            TestCase::Get => 202,
            TestCase::Delete => 204,
            TestCase::Multipart => 216,
            TestCase::Resumable => 230,
            TestCase::Mix => 900,
            TestCase::Other(n) => n,
        }
    }

    pub fn is_mix(self) -> bool {
        matches!(self, TestCase::Mix)
    }
}

impl From<i32> for TestCase {
    fn from(n: i32) -> Self {
        match n {
            201 => TestCase::Put,
            202 => TestCase::Get,
            204 => TestCase::Delete,
            216 => TestCase::Multipart,
            230 => TestCase::Resumable,
            900 => TestCase::Mix,
            other => TestCase::Other(other),
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// `LogLevel` as parsed from the config file; maps onto [`tracing::Level`]
/// in `logging.rs`, with an extra `Off` the `tracing` crate has no level
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    fn from_config_str(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "WARN" => LogLevel::Warn,
            "ERROR" => LogLevel::Error,
            "OFF" => LogLevel::Off,
            _ => LogLevel::Info,
        }
    }
}

/// An `ObjectSize` spec: either a fixed size, or a `min~max` range sampled
/// uniformly per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectSizeSpec {
    Fixed(i64),
    Range { min: i64, max: i64 },
}

impl ObjectSizeSpec {
    pub fn max(self) -> i64 {
        match self {
            ObjectSizeSpec::Fixed(n) => n,
            ObjectSizeSpec::Range { max, .. } => max,
        }
    }
}

/// One parsed `Range` entry out of the `;`-separated `Range` config value:
/// `a-b` (closed), `a-` (open-ended from `a`), or `-n` (trailing `n`
/// bytes — anchored at offset 0 per this implementation's resolution of
/// the otherwise-unspecified "last n bytes" semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    Closed { start: u64, end: u64 },
    OpenEnded { start: u64 },
    Trailing { count: u64 },
}

impl FromStr for RangeSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix('-') {
            let count: u64 = rest
                .parse()
                .map_err(|_| format!("invalid trailing range spec: {s}"))?;
            return Ok(RangeSpec::Trailing { count });
        }

        match s.split_once('-') {
            Some((start, "")) => {
                let start: u64 = start
                    .parse()
                    .map_err(|_| format!("invalid open-ended range spec: {s}"))?;
                Ok(RangeSpec::OpenEnded { start })
            }
            Some((start, end)) => {
                let start: u64 = start
                    .parse()
                    .map_err(|_| format!("invalid range spec: {s}"))?;
                let end: u64 = end
                    .parse()
                    .map_err(|_| format!("invalid range spec: {s}"))?;
                Ok(RangeSpec::Closed { start, end })
            }
            None => Err(format!("invalid range spec: {s}")),
        }
    }
}

const MAX_MIX_OPS: usize = 32;

/// The full, validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub transport: Transport,
    pub keep_alive: bool,
    pub connect_timeout_secs: u32,
    pub request_timeout_secs: u32,

    pub target_user_count: u32,
    pub threads_per_user: u32,
    pub bucket_name_prefix: String,
    pub bucket_name_fixed: String,
    pub is_temporary_token: bool,
    pub temp_token_command: String,

    pub requests_per_thread: i64,
    pub test_case: TestCase,

    pub object_size: ObjectSizeSpec,

    pub range_options: Vec<RangeSpec>,

    pub part_size: i64,
    pub key_prefix: String,
    pub run_seconds: i64,

    pub log_level: LogLevel,
    pub obj_name_pattern_hash: bool,

    pub enable_checkpoint: bool,
    pub upload_file_path: Option<String>,

    pub mix_ops: Vec<i32>,
    pub mix_loop_count: i64,
    pub use_mix_mode: bool,

    pub gm_mode_switch: bool,
    pub ssl_min_version: Option<i64>,
    pub ssl_max_version: Option<i64>,
    pub mutual_ssl_switch: bool,
    pub server_cert_path: Option<String>,
    pub client_sign_cert_path: Option<String>,
    pub client_sign_key_path: Option<String>,
    pub client_sign_key_password: Option<String>,
    pub client_enc_cert_path: Option<String>,
    pub client_enc_key_path: Option<String>,

    pub enable_data_validation: bool,
    pub enable_detail_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            transport: Transport::Https,
            keep_alive: true,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,

            target_user_count: 0,
            threads_per_user: 1,
            bucket_name_prefix: String::new(),
            bucket_name_fixed: String::new(),
            is_temporary_token: false,
            temp_token_command: "python3 generate_temp_ak_sk.py".to_string(),

            requests_per_thread: 1,
            test_case: TestCase::Put,

            object_size: ObjectSizeSpec::Fixed(1024),

            range_options: Vec::new(),

            part_size: 5 * 1024 * 1024,
            key_prefix: String::new(),
            run_seconds: 0,

            log_level: LogLevel::Info,
            obj_name_pattern_hash: false,

            enable_checkpoint: true,
            upload_file_path: None,

            mix_ops: Vec::new(),
            mix_loop_count: 0,
            use_mix_mode: false,

            gm_mode_switch: false,
            ssl_min_version: None,
            ssl_max_version: None,
            mutual_ssl_switch: false,
            server_cert_path: None,
            client_sign_cert_path: None,
            client_sign_key_path: None,
            client_sign_key_password: None,
            client_enc_cert_path: None,
            client_enc_key_path: None,

            enable_data_validation: false,
            enable_detail_log: false,
        }
    }
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

fn parse_int(key: &str, val: &str) -> Result<i64, ConfigError> {
    val.trim().parse().map_err(|_| ConfigError::InvalidInteger {
        key: key.to_string(),
        value: val.to_string(),
    })
}

fn parse_mix_ops(val: &str) -> Vec<i32> {
    val.split(',')
        .filter_map(|tok| {
            let tok = tok.trim();
            if tok.is_empty() {
                return None;
            }
            let op: i32 = tok.parse().ok()?;
            if op <= 0 || op == TestCase::Mix.code() {
                None
            } else {
                Some(op)
            }
        })
        .take(MAX_MIX_OPS)
        .collect()
}

/// Loads and validates a configuration file. Unknown keys and malformed
/// lines without an `=` are ignored, matching the permissive original
/// format; `#`-prefixed and `[section]`-style lines are comments.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Open {
        path: path.display().to_string(),
        source,
    })?;

    let mut raw: HashMap<String, String> = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            raw.insert(key.trim().to_string(), val.trim().to_string());
        }
    }

    let mut cfg = Config::default();
    let get = |k: &str| raw.get(k).map(String::as_str);

    if let Some(v) = get("Endpoint") {
        cfg.endpoint = v.to_string();
    }
    if let Some(v) = get("Protocol") {
        cfg.transport = if v.eq_ignore_ascii_case("http") {
            Transport::Http
        } else {
            Transport::Https
        };
    }
    if let Some(v) = get("KeepAlive") {
        cfg.keep_alive = parse_bool(v);
    }
    if let Some(v) = get("ConnectTimeoutSec") {
        cfg.connect_timeout_secs = parse_int("ConnectTimeoutSec", v)? as u32;
    }
    if let Some(v) = get("RequestTimeoutSec") {
        cfg.request_timeout_secs = parse_int("RequestTimeoutSec", v)? as u32;
    }
    if let Some(v) = get("LogLevel") {
        cfg.log_level = LogLevel::from_config_str(v);
    }
    if let Some(v) = get("ObjNamePatternHash") {
        cfg.obj_name_pattern_hash = parse_bool(v);
    }
    if let Some(v) = get("EnableCheckpoint") {
        cfg.enable_checkpoint = parse_bool(v);
    }
    if let Some(v) = get("UploadFilePath") {
        cfg.upload_file_path = Some(v.to_string());
    }
    if let Some(v) = get("BucketNamePrefix") {
        cfg.bucket_name_prefix = v.to_string();
    }
    if let Some(v) = get("BucketNameFixed") {
        cfg.bucket_name_fixed = v.to_string();
    }
    if let Some(v) = get("IsTemporaryToken") {
        cfg.is_temporary_token = parse_bool(v);
    }
    if let Some(v) = get("TempTokenCommand") {
        cfg.temp_token_command = v.to_string();
    }
    if let Some(v) = get("Users") {
        cfg.target_user_count = parse_int("Users", v)?.max(0) as u32;
    }
    if let Some(v) = get("ThreadsPerUser") {
        cfg.threads_per_user = parse_int("ThreadsPerUser", v)?.max(1) as u32;
    }
    if let Some(v) = get("RequestsPerThread") {
        cfg.requests_per_thread = parse_int("RequestsPerThread", v)?;
    }
    if let Some(v) = get("TestCase") {
        cfg.test_case = TestCase::from(parse_int("TestCase", v)? as i32);
    }

    if let Some(v) = get("ObjectSize") {
        cfg.object_size = match v.split_once('~') {
            Some((lo, hi)) => {
                let min: i64 = lo.trim().parse().map_err(|_| ConfigError::InvalidInteger {
                    key: "ObjectSize".to_string(),
                    value: v.to_string(),
                })?;
                let max: i64 = hi.trim().parse().map_err(|_| ConfigError::InvalidInteger {
                    key: "ObjectSize".to_string(),
                    value: v.to_string(),
                })?;
                if min > max {
                    return Err(ConfigError::InvalidObjectSizeRange { min, max });
                }
                ObjectSizeSpec::Range { min, max }
            }
            None => {
                let n = parse_int("ObjectSize", v)?;
                ObjectSizeSpec::Fixed(n)
            }
        };
    }

    if let Some(v) = get("Range") {
        cfg.range_options = v
            .split(';')
            .filter_map(|tok| {
                let tok = tok.trim();
                if tok.is_empty() {
                    None
                } else {
                    tok.parse().ok()
                }
            })
            .take(64)
            .collect();
    }

    if let Some(v) = get("PartSize") {
        cfg.part_size = parse_int("PartSize", v)?;
    }
    if let Some(v) = get("KeyPrefix") {
        cfg.key_prefix = v.to_string();
    }
    if let Some(v) = get("MixOperation") {
        cfg.mix_ops = parse_mix_ops(v);
    }
    if let Some(v) = get("MixLoopCount") {
        cfg.mix_loop_count = parse_int("MixLoopCount", v)?;
    }
    if let Some(v) = get("RunSeconds") {
        cfg.run_seconds = parse_int("RunSeconds", v)?;
    }

    if let Some(v) = get("GmModeSwitch") {
        cfg.gm_mode_switch = parse_bool(v);
    }
    if let Some(v) = get("MutualSslSwitch") {
        cfg.mutual_ssl_switch = parse_bool(v);
    }
    if let Some(v) = get("SslMinVersion") {
        cfg.ssl_min_version = Some(parse_int("SslMinVersion", v)?);
    }
    if let Some(v) = get("SslMaxVersion") {
        cfg.ssl_max_version = Some(parse_int("SslMaxVersion", v)?);
    }
    if let Some(v) = get("ServerCertPath") {
        cfg.server_cert_path = Some(v.to_string());
    }
    if let Some(v) = get("ClientSignCertPath") {
        cfg.client_sign_cert_path = Some(v.to_string());
    }
    if let Some(v) = get("ClientSignKeyPath") {
        cfg.client_sign_key_path = Some(v.to_string());
    }
    if let Some(v) = get("ClientSignKeyPassword") {
        cfg.client_sign_key_password = Some(v.to_string());
    }
    if let Some(v) = get("ClientEncCertPath") {
        cfg.client_enc_cert_path = Some(v.to_string());
    }
    if let Some(v) = get("ClientEncKeyPath") {
        cfg.client_enc_key_path = Some(v.to_string());
    }

    if let Some(v) = get("EnableDataValidation") {
        cfg.enable_data_validation = parse_bool(v);
    }
    if let Some(v) = get("EnableDetailLog") {
        cfg.enable_detail_log = parse_bool(v);
    }

    if cfg.part_size <= 0 {
        cfg.part_size = 5 * 1024 * 1024;
    }
    if cfg.target_user_count == 0 {
        return Err(ConfigError::MissingUserCount);
    }

    cfg.use_mix_mode = cfg.test_case.is_mix() && !cfg.mix_ops.is_empty();

    if (cfg.mutual_ssl_switch || cfg.gm_mode_switch) && cfg.transport != Transport::Https {
        return Err(ConfigError::SecureProtocolRequired);
    }
    if cfg.mutual_ssl_switch
        && (cfg.server_cert_path.is_none()
            || cfg.client_sign_cert_path.is_none()
            || cfg.client_sign_key_path.is_none())
    {
        return Err(ConfigError::IncompleteMutualSslPaths);
    }
    if cfg.gm_mode_switch
        && (cfg.server_cert_path.is_none()
            || cfg.client_enc_cert_path.is_none()
            || cfg.client_enc_key_path.is_none())
    {
        return Err(ConfigError::IncompleteGmModePaths);
    }

    Ok(cfg)
}
