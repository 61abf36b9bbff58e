//! The narrow interface the engine consumes from the externally supplied
//! object-storage client library. Request signing, TLS, HTTP framing and
//! retries all live on the other side of this trait — the engine never
//! assumes anything about wire encoding (spec §1, §6).
//!
//! In the original C tool this boundary is a struct of function pointers
//! plus an opaque `void *callback_data`; the idiomatic Rust replacement is a
//! trait whose methods take ordinary closures for the streaming callbacks
//! and return the "complete" outcome directly, since a blocking call's
//! return value already *is* its completion callback.

use std::path::Path;

use crate::classifier::ErrorKind;

/// TLS/plaintext selection, mirroring `obs_protocol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Https,
    Http,
}

/// Mutual-TLS / national-cryptography ("GM mode") transport knobs. The
/// engine never terminates TLS itself; these are plumbed straight through
/// to the external client's options record.
#[derive(Debug, Clone, Default)]
pub struct SecurityOptions {
    pub gm_mode: bool,
    pub mutual_ssl: bool,
    pub ssl_min_version: Option<i64>,
    pub ssl_max_version: Option<i64>,
    pub server_cert_path: Option<String>,
    pub client_sign_cert_path: Option<String>,
    pub client_sign_key_path: Option<String>,
    pub client_sign_key_password: Option<String>,
    pub client_enc_cert_path: Option<String>,
    pub client_enc_key_path: Option<String>,
}

/// Per-call request options, composed by the adapter from the immutable
/// configuration plus the worker's bound credentials (spec §4.B).
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
    pub transport: Transport,
    pub keep_alive: bool,
    pub connect_timeout_secs: u32,
    pub request_timeout_secs: u32,
    pub security: SecurityOptions,
}

/// What the properties callback captures: arrives once, before any data
/// callback.
#[derive(Debug, Clone, Default)]
pub struct ResponseProperties {
    pub etag: Option<String>,
    pub content_length: Option<u64>,
    pub request_id: Option<String>,
}

/// The outcome of a single call: the terminal error kind (or `Ok`) plus
/// whatever the properties callback captured, and an upload-id for
/// multipart initiation.
#[derive(Debug, Clone, Default)]
pub struct CallResult {
    pub kind: Option<ErrorKind>,
    pub properties: ResponseProperties,
    pub upload_id: Option<String>,
}

impl CallResult {
    pub fn ok() -> Self {
        Self {
            kind: Some(ErrorKind::Ok),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.kind, Some(ErrorKind::Ok))
    }

    pub fn error_kind(&self) -> ErrorKind {
        self.kind.unwrap_or(ErrorKind::Other)
    }
}

/// One already-uploaded part, ready for `complete_multipart_upload`.
#[derive(Debug, Clone)]
pub struct PartInfo {
    pub part_number: u32,
    pub etag: String,
}

/// Whether the download-consume callback wants the transfer to keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeSignal {
    Continue,
    Abort,
}

/// A single entry returned by `list_bucket_objects`.
#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
    pub etag: String,
}

/// The narrow operation interface consumed from the external client
/// library. All calls are synchronous/blocking — the worker thread that
/// calls them is parked for the duration (spec §5 "Suspension points").
pub trait ObjectStoreClient: Send + Sync {
    fn put_object(
        &self,
        opts: &RequestOptions,
        key: &str,
        content_length: u64,
        on_properties: &mut dyn FnMut(&ResponseProperties),
        produce: &mut dyn FnMut(&mut [u8]) -> usize,
    ) -> CallResult;

    fn get_object(
        &self,
        opts: &RequestOptions,
        key: &str,
        range: Option<(u64, Option<u64>)>,
        on_properties: &mut dyn FnMut(&ResponseProperties),
        consume: &mut dyn FnMut(&[u8]) -> ConsumeSignal,
    ) -> CallResult;

    fn delete_object(&self, opts: &RequestOptions, key: &str) -> CallResult;

    fn list_bucket_objects(
        &self,
        opts: &RequestOptions,
        prefix: &str,
        max_keys: u32,
    ) -> Result<Vec<ListedObject>, CallResult>;

    fn initiate_multipart_upload(&self, opts: &RequestOptions, key: &str) -> CallResult;

    fn upload_part(
        &self,
        opts: &RequestOptions,
        key: &str,
        upload_id: &str,
        part_number: u32,
        content_length: u64,
        on_properties: &mut dyn FnMut(&ResponseProperties),
        produce: &mut dyn FnMut(&mut [u8]) -> usize,
    ) -> CallResult;

    fn complete_multipart_upload(
        &self,
        opts: &RequestOptions,
        key: &str,
        upload_id: &str,
        parts: &[PartInfo],
    ) -> CallResult;

    /// Resumable file upload: the external client reads `file_path` itself
    /// and manages its own internal part scheduling. `checkpoint_path` is
    /// passed through even though the canonical configuration keeps
    /// checkpointing disabled (spec §4.B).
    fn upload_file(
        &self,
        opts: &RequestOptions,
        key: &str,
        file_path: &Path,
        part_size: u64,
        checkpoint_path: Option<&Path>,
        enable_checkpoint: bool,
    ) -> CallResult;
}

pub mod mock {
    //! An in-memory stand-in for the external client library. There is no
    //! bundled binding to a real object-storage SDK (the program this was
    //! built against linked one in at compile time via a vendor header);
    //! this backend lets the binary and the test suite both round-trip
    //! bytes through a `HashMap` and exercise real PUT/GET/DELETE/multipart
    //! semantics without one.

    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Bucket {
        objects: HashMap<String, Vec<u8>>,
    }

    /// In-memory [`ObjectStoreClient`]. Every key is namespaced by
    /// `opts.bucket` so multiple "buckets" can coexist within one instance.
    #[derive(Default)]
    pub struct InMemoryClient {
        buckets: Mutex<HashMap<String, Bucket>>,
        /// When set, the next PUT's upload-produce callback will have the
        /// byte at this logical offset flipped before it reaches storage —
        /// used to simulate on-the-wire corruption for validation tests.
        pub corrupt_offset: Mutex<Option<u64>>,
    }

    impl InMemoryClient {
        pub fn new() -> Self {
            Self::default()
        }

        fn with_bucket<R>(&self, bucket: &str, f: impl FnOnce(&mut Bucket) -> R) -> R {
            let mut buckets = self.buckets.lock().unwrap();
            let b = buckets.entry(bucket.to_string()).or_default();
            f(b)
        }
    }

    impl ObjectStoreClient for InMemoryClient {
        fn put_object(
            &self,
            opts: &RequestOptions,
            key: &str,
            content_length: u64,
            on_properties: &mut dyn FnMut(&ResponseProperties),
            produce: &mut dyn FnMut(&mut [u8]) -> usize,
        ) -> CallResult {
            on_properties(&ResponseProperties::default());

            let mut data = Vec::with_capacity(content_length as usize);
            let mut chunk = vec![0u8; 64 * 1024];
            loop {
                let n = produce(&mut chunk);
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);
            }

            if let Some(offset) = self.corrupt_offset.lock().unwrap().take() {
                if (offset as usize) < data.len() {
                    data[offset as usize] ^= 0xFF;
                }
            }

            self.with_bucket(&opts.bucket, |b| {
                b.objects.insert(key.to_string(), data);
            });

            CallResult {
                kind: Some(ErrorKind::Ok),
                properties: ResponseProperties {
                    etag: Some(format!("\"{:x}\"", fastrand::u64(..))),
                    content_length: Some(content_length),
                    request_id: Some(format!("req-{:08x}", fastrand::u32(..))),
                },
                upload_id: None,
            }
        }

        fn get_object(
            &self,
            opts: &RequestOptions,
            key: &str,
            range: Option<(u64, Option<u64>)>,
            on_properties: &mut dyn FnMut(&ResponseProperties),
            consume: &mut dyn FnMut(&[u8]) -> ConsumeSignal,
        ) -> CallResult {
            let found = self.with_bucket(&opts.bucket, |b| b.objects.get(key).cloned());
            let Some(data) = found else {
                return CallResult {
                    kind: Some(ErrorKind::NoSuchKey),
                    ..Default::default()
                };
            };

            let (start, count) = range.unwrap_or((0, None));
            let start = start as usize;
            let end = match count {
                Some(c) => (start + c as usize).min(data.len()),
                None => data.len(),
            };
            let slice = if start <= data.len() { &data[start..end] } else { &[] };

            on_properties(&ResponseProperties {
                etag: Some("\"mock-etag\"".to_string()),
                content_length: Some(slice.len() as u64),
                request_id: Some(format!("req-{:08x}", fastrand::u32(..))),
            });

            for chunk in slice.chunks(64 * 1024) {
                if consume(chunk) == ConsumeSignal::Abort {
                    return CallResult {
                        kind: Some(ErrorKind::DataCorruption),
                        ..Default::default()
                    };
                }
            }

            CallResult::ok()
        }

        fn delete_object(&self, opts: &RequestOptions, key: &str) -> CallResult {
            let existed = self.with_bucket(&opts.bucket, |b| b.objects.remove(key).is_some());
            if existed {
                CallResult::ok()
            } else {
                CallResult {
                    kind: Some(ErrorKind::NoSuchKey),
                    ..Default::default()
                }
            }
        }

        fn list_bucket_objects(
            &self,
            opts: &RequestOptions,
            prefix: &str,
            max_keys: u32,
        ) -> Result<Vec<ListedObject>, CallResult> {
            Ok(self.with_bucket(&opts.bucket, |b| {
                b.objects
                    .iter()
                    .filter(|(k, _)| k.starts_with(prefix))
                    .take(max_keys as usize)
                    .map(|(k, v)| ListedObject {
                        key: k.clone(),
                        size: v.len() as u64,
                        etag: "\"mock-etag\"".to_string(),
                    })
                    .collect()
            }))
        }

        fn initiate_multipart_upload(&self, _opts: &RequestOptions, _key: &str) -> CallResult {
            CallResult {
                kind: Some(ErrorKind::Ok),
                upload_id: Some(format!("upload-{:08x}", fastrand::u32(..))),
                properties: ResponseProperties::default(),
            }
        }

        fn upload_part(
            &self,
            _opts: &RequestOptions,
            key: &str,
            upload_id: &str,
            part_number: u32,
            _content_length: u64,
            on_properties: &mut dyn FnMut(&ResponseProperties),
            produce: &mut dyn FnMut(&mut [u8]) -> usize,
        ) -> CallResult {
            on_properties(&ResponseProperties::default());

            let mut data = Vec::new();
            let mut chunk = vec![0u8; 64 * 1024];
            loop {
                let n = produce(&mut chunk);
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);
            }

            self.with_bucket("parts", |b| {
                b.objects
                    .insert(format!("{key}/{upload_id}/{part_number}"), data);
            });

            CallResult {
                kind: Some(ErrorKind::Ok),
                properties: ResponseProperties {
                    etag: Some(format!("\"part-{part_number}\"")),
                    ..Default::default()
                },
                upload_id: None,
            }
        }

        fn complete_multipart_upload(
            &self,
            opts: &RequestOptions,
            key: &str,
            upload_id: &str,
            parts: &[PartInfo],
        ) -> CallResult {
            let mut assembled = Vec::new();
            for part in parts {
                let part_key = format!("{key}/{upload_id}/{}", part.part_number);
                if let Some(bytes) = self.with_bucket("parts", |b| b.objects.remove(&part_key)) {
                    assembled.extend_from_slice(&bytes);
                }
            }

            self.with_bucket(&opts.bucket, |b| {
                b.objects.insert(key.to_string(), assembled);
            });

            CallResult::ok()
        }

        fn upload_file(
            &self,
            opts: &RequestOptions,
            key: &str,
            file_path: &Path,
            _part_size: u64,
            _checkpoint_path: Option<&Path>,
            _enable_checkpoint: bool,
        ) -> CallResult {
            match std::fs::read(file_path) {
                Ok(data) => {
                    self.with_bucket(&opts.bucket, |b| {
                        b.objects.insert(key.to_string(), data);
                    });
                    CallResult::ok()
                }
                Err(_) => CallResult {
                    kind: Some(ErrorKind::ConnectionFailed),
                    ..Default::default()
                },
            }
        }
    }
}
