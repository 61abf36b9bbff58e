//! Final-summary report: a human-readable `brief.txt` alongside a
//! machine-readable `brief.json`, both written atomically (temp file +
//! rename) the way the teacher's metrics snapshot does (spec §4.G, §6).

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Final aggregated counters across every worker, already summed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Totals {
    pub success: u64,
    pub fail_403: u64,
    pub fail_404: u64,
    pub fail_409: u64,
    pub fail_4xx_other: u64,
    pub fail_5xx: u64,
    pub fail_other: u64,
    pub fail_validation: u64,
    pub total_success_bytes: u64,
}

impl Totals {
    pub fn total_failed(&self) -> u64 {
        self.fail_403
            + self.fail_404
            + self.fail_409
            + self.fail_4xx_other
            + self.fail_5xx
            + self.fail_other
            + self.fail_validation
    }

    pub fn total_requests(&self) -> u64 {
        self.success + self.total_failed()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub timestamp: i64,
    pub endpoint: String,
    pub bucket_fixed: Option<String>,
    pub bucket_prefix: Option<String>,
    pub temp_token_mode: bool,
    pub protocol: String,
    pub keep_alive: bool,
    pub connect_timeout_secs: u32,
    pub request_timeout_secs: u32,
    pub total_threads: u32,
    pub loaded_user_count: u32,
    pub threads_per_user: u32,
    pub run_seconds: i64,
    pub mixed_mode: bool,
    pub mix_loop_count: i64,
    pub requests_per_thread: i64,
    pub totals: Totals,
    pub actual_duration_secs: f64,
    pub tps: f64,
    pub throughput_mbps: f64,
}

impl BenchmarkReport {
    pub fn new(
        config: &Config,
        loaded_user_count: u32,
        total_threads: u32,
        totals: Totals,
        actual_duration_secs: f64,
    ) -> Self {
        let total_reqs = totals.total_requests();
        let tps = if actual_duration_secs > 0.0 {
            total_reqs as f64 / actual_duration_secs
        } else {
            0.0
        };
        let throughput_mbps = if actual_duration_secs > 0.0 {
            (totals.total_success_bytes as f64 / 1024.0 / 1024.0) / actual_duration_secs
        } else {
            0.0
        };

        Self {
            timestamp: time_format::from_system_time(std::time::SystemTime::now()).unwrap_or(0),
            endpoint: config.endpoint.clone(),
            bucket_fixed: (!config.bucket_name_fixed.is_empty()).then(|| config.bucket_name_fixed.clone()),
            bucket_prefix: (!config.bucket_name_prefix.is_empty()).then(|| config.bucket_name_prefix.clone()),
            temp_token_mode: config.is_temporary_token,
            protocol: format!("{:?}", config.transport),
            keep_alive: config.keep_alive,
            connect_timeout_secs: config.connect_timeout_secs,
            request_timeout_secs: config.request_timeout_secs,
            total_threads,
            loaded_user_count,
            threads_per_user: config.threads_per_user,
            run_seconds: config.run_seconds,
            mixed_mode: config.use_mix_mode,
            mix_loop_count: config.mix_loop_count,
            requests_per_thread: config.requests_per_thread,
            totals,
            actual_duration_secs,
            tps,
            throughput_mbps,
        }
    }

    fn render_text(&self) -> String {
        let mut s = String::new();
        s.push_str("===========================================\n");
        s.push_str("   Object Storage Benchmark Execution Report\n");
        s.push_str("===========================================\n");
        if let Ok(stamp) = time_format::strftime_utc("%Y-%m-%d %H:%M:%S", self.timestamp) {
            s.push_str(&format!("Execution Time:      {stamp}\n"));
        }
        s.push_str("---------------- Configuration ----------------\n");
        s.push_str("[Environment]\n");
        s.push_str(&format!("  Endpoint:          {}\n", self.endpoint));
        s.push_str(&format!(
            "  Bucket(Fixed):     {}\n",
            self.bucket_fixed.as_deref().unwrap_or("N/A")
        ));
        s.push_str(&format!(
            "  Bucket(Prefix):    {}\n",
            self.bucket_prefix.as_deref().unwrap_or("N/A")
        ));
        s.push_str(&format!("  STS Auth Mode:     {}\n", self.temp_token_mode));
        s.push_str("[Network]\n");
        s.push_str(&format!("  Protocol:          {}\n", self.protocol));
        s.push_str(&format!("  KeepAlive:         {}\n", self.keep_alive));
        s.push_str(&format!("  ConnectTimeout:    {} sec\n", self.connect_timeout_secs));
        s.push_str(&format!("  RequestTimeout:    {} sec\n", self.request_timeout_secs));
        s.push_str("[TestPlan]\n");
        s.push_str(&format!(
            "  Total Threads:     {} ({} Users x {} Threads/User)\n",
            self.total_threads, self.loaded_user_count, self.threads_per_user
        ));
        s.push_str(&format!(
            "  RunSeconds:        {} {}\n",
            self.run_seconds,
            if self.run_seconds > 0 { "(Time Limited)" } else { "(No Limit)" }
        ));
        if self.mixed_mode {
            s.push_str("  TestMode:          Mixed Operations (900)\n");
            s.push_str(&format!("  MixLoopCount:      {}\n", self.mix_loop_count));
        } else {
            s.push_str("  TestMode:          Standard TestCase\n");
        }
        s.push_str(&format!("  ReqsPerOp/Thread:  {}\n", self.requests_per_thread));

        s.push_str("---------------- Statistics -------------------\n");
        s.push_str(&format!("Total Requests:      {}\n", self.totals.total_requests()));
        s.push_str(&format!("Success:             {}\n", self.totals.success));
        s.push_str(&format!("Failed:              {}\n", self.totals.total_failed()));
        s.push_str(&format!("  |- 403 (Forbidden):  {}\n", self.totals.fail_403));
        s.push_str(&format!("  |- 404 (NotFound):   {}\n", self.totals.fail_404));
        s.push_str(&format!("  |- 409 (Conflict):   {}\n", self.totals.fail_409));
        s.push_str(&format!("  |- 4xx (Other):      {}\n", self.totals.fail_4xx_other));
        s.push_str(&format!("  |- 5xx (Server):     {}\n", self.totals.fail_5xx));
        s.push_str(&format!("  |- Other (Net/SDK):  {}\n", self.totals.fail_other));
        s.push_str(&format!(
            "  |- Internal Validation Fail: {}\n",
            self.totals.fail_validation
        ));

        s.push_str("\nPerformance:\n");
        s.push_str(&format!("  Final TPS:           {:.2}\n", self.tps));
        s.push_str(&format!("  Final Throughput:    {:.2} MB/s\n", self.throughput_mbps));
        s.push_str("===========================================\n");
        s
    }

    /// Writes `brief.txt` and `brief.json` into `dir`, each via a temp file
    /// plus rename so a reader never observes a half-written report.
    pub fn write_to_dir(&self, dir: &Path) -> io::Result<()> {
        write_atomic(&dir.join("brief.txt"), self.render_text().as_bytes())?;
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&dir.join("brief.json"), json.as_bytes())?;
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("out");
    let tmp_path = path.with_file_name(format!(".{filename}.tmp"));
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(contents)?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tps_and_throughput_are_zero_when_duration_is_zero() {
        let config = Config::default();
        let totals = Totals {
            success: 10,
            total_success_bytes: 1024,
            ..Default::default()
        };
        let report = BenchmarkReport::new(&config, 1, 1, totals, 0.0);
        assert_eq!(report.tps, 0.0);
        assert_eq!(report.throughput_mbps, 0.0);
    }

    #[test]
    fn totals_roll_up_failures_correctly() {
        let totals = Totals {
            success: 5,
            fail_403: 1,
            fail_404: 2,
            ..Default::default()
        };
        assert_eq!(totals.total_failed(), 3);
        assert_eq!(totals.total_requests(), 8);
    }

    #[test]
    fn write_to_dir_produces_both_files_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let totals = Totals {
            success: 3,
            ..Default::default()
        };
        let report = BenchmarkReport::new(&config, 1, 1, totals, 1.0);
        report.write_to_dir(dir.path()).unwrap();

        assert!(dir.path().join("brief.txt").exists());
        assert!(dir.path().join("brief.json").exists());
        assert!(!dir.path().join("brief.txt.tmp").exists());

        let json = fs::read_to_string(dir.path().join("brief.json")).unwrap();
        let parsed: BenchmarkReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.totals.success, 3);
    }

    #[test]
    fn text_report_reflects_mixed_mode_section() {
        let mut config = Config::default();
        config.use_mix_mode = true;
        config.mix_loop_count = 7;
        let report = BenchmarkReport::new(&config, 1, 1, Totals::default(), 1.0);
        let text = report.render_text();
        assert!(text.contains("Mixed Operations"));
        assert!(text.contains("MixLoopCount:      7"));
    }
}
