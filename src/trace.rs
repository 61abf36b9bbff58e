//! Per-worker, batched, rotating CSV trace writer (spec §4.E). Buffers rows
//! in memory and flushes in batches of 1000 to avoid a syscall per request;
//! rotates to a new file every 1,000,000 cumulative rows so no single file
//! grows unbounded across a long-running test. Columns:
//! `timestamp_s,op_type,key,latency_ms,sdk_status,http_code,bytes,request_id`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const BATCH_SIZE: usize = 1000;
const ROTATE_AT: u64 = 1_000_000;

/// One request's trace line.
#[derive(Debug, Clone)]
pub struct ReqRecord {
    pub timestamp_s: f64,
    pub op_type: i32,
    pub key: String,
    pub latency_ms: f64,
    pub sdk_status: String,
    pub http_code: u16,
    pub bytes: u64,
    pub request_id: String,
}

impl ReqRecord {
    fn write_csv_row(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(
            out,
            "{:.6},{},{},{:.3},{},{},{},{}",
            self.timestamp_s,
            self.op_type,
            csv_escape(&self.key),
            self.latency_ms,
            csv_escape(&self.sdk_status),
            self.http_code,
            self.bytes,
            csv_escape(&self.request_id),
        )
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Writes `detail_{worker_id}_part{idx}.csv` files under `dir`, rotating
/// every [`ROTATE_AT`] rows and flushing every [`BATCH_SIZE`] buffered rows.
pub struct TraceWriter {
    dir: PathBuf,
    worker_id: usize,
    part_idx: u32,
    rows_in_part: u64,
    buffer: Vec<ReqRecord>,
    file: BufWriter<File>,
}

impl TraceWriter {
    pub fn new(dir: &Path, worker_id: usize) -> io::Result<Self> {
        let file = Self::open_part(dir, worker_id, 0)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            worker_id,
            part_idx: 0,
            rows_in_part: 0,
            buffer: Vec::with_capacity(BATCH_SIZE),
            file,
        })
    }

    fn open_part(dir: &Path, worker_id: usize, part_idx: u32) -> io::Result<BufWriter<File>> {
        let path = dir.join(format!("detail_{worker_id}_part{part_idx}.csv"));
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(
            file,
            "timestamp_s,op_type,key,latency_ms,sdk_status,http_code,bytes,request_id"
        )?;
        Ok(file)
    }

    pub fn record(&mut self, rec: ReqRecord) -> io::Result<()> {
        self.buffer.push(rec);
        if self.buffer.len() >= BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        for rec in self.buffer.drain(..) {
            rec.write_csv_row(&mut self.file)?;
            self.rows_in_part += 1;
            if self.rows_in_part >= ROTATE_AT {
                self.file.flush()?;
                self.part_idx += 1;
                self.rows_in_part = 0;
                self.file = Self::open_part(&self.dir, self.worker_id, self.part_idx)?;
            }
        }
        self.file.flush()
    }
}

impl Drop for TraceWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(i: u64) -> ReqRecord {
        ReqRecord {
            timestamp_s: i as f64,
            op_type: 201,
            key: format!("key-{i}"),
            latency_ms: 1.5,
            sdk_status: "Ok".to_string(),
            http_code: 200,
            bytes: 1024,
            request_id: format!("req-{i}"),
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = TraceWriter::new(dir.path(), 0).unwrap();
        w.record(rec(1)).unwrap();
        w.flush().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("detail_0_part0.csv")).unwrap();
        assert!(contents.starts_with("timestamp_s,op_type,key,latency_ms,sdk_status,http_code,bytes,request_id\n"));
        assert!(contents.contains("key-1"));
    }

    #[test]
    fn batches_before_flushing_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = TraceWriter::new(dir.path(), 1).unwrap();
        for i in 0..BATCH_SIZE - 1 {
            w.record(rec(i as u64)).unwrap();
        }
        let contents = std::fs::read_to_string(dir.path().join("detail_1_part0.csv")).unwrap();
        assert_eq!(contents.lines().count(), 1, "only the header should be flushed so far");
    }

    #[test]
    fn escapes_commas_in_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = TraceWriter::new(dir.path(), 0).unwrap();
        let mut r = rec(1);
        r.key = "has,comma".to_string();
        w.record(r).unwrap();
        w.flush().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("detail_0_part0.csv")).unwrap();
        assert!(contents.contains("\"has,comma\""));
    }
}
