//! Maps the external client library's error kind onto an inferred HTTP
//! outcome class used for both statistics buckets and trace rows.
//!
//! The engine never sees a real HTTP status line — only whatever symbolic
//! kind the client library's callbacks report — so this is an *inference*,
//! not an authoritative decode (see spec Non-goals).

use serde::{Deserialize, Serialize};

/// The error kind an [`crate::client::ObjectStoreClient`] call can terminate
/// with. Mirrors the `obs_status` enum of the external library this engine
/// was built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Ok,
    AccessDenied,
    InvalidAccessKeyId,
    SignatureDoesNotMatch,
    InvalidSecurity,
    NoSuchBucket,
    NoSuchKey,
    NoSuchUpload,
    NoSuchVersion,
    BucketAlreadyExists,
    BucketAlreadyOwnedByYou,
    BucketNotEmpty,
    InternalError,
    ServiceUnavailable,
    SlowDown,
    ConnectionFailed,
    NameLookupError,
    RequestTimeout,
    /// Raised by the adapter itself (never by the external client) when
    /// content fails verification or a short read is detected; the worker
    /// must not re-classify this through the ordinary table (it is already
    /// counted as a validation failure by the adapter).
    DataCorruption,
    /// Anything else reported by the external client that doesn't fit a
    /// more specific kind above, at or after the first service-side error.
    Other,
}

/// An inferred outcome class. 0 means no HTTP reply reached the engine
/// (pure transport/SDK failure); the rest mirror the status line the
/// service would plausibly have sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeClass {
    Success200,
    Success204,
    Success206,
    Http400,
    Http403,
    Http404,
    Http409,
    Http500,
    Network0,
}

impl OutcomeClass {
    pub fn http_code(self) -> u16 {
        match self {
            OutcomeClass::Success200 => 200,
            OutcomeClass::Success204 => 204,
            OutcomeClass::Success206 => 206,
            OutcomeClass::Http400 => 400,
            OutcomeClass::Http403 => 403,
            OutcomeClass::Http404 => 404,
            OutcomeClass::Http409 => 409,
            OutcomeClass::Http500 => 500,
            OutcomeClass::Network0 => 0,
        }
    }
}

/// The shape of a successful response, used only to pick between the three
/// 2xx outcome classes the spec distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessShape {
    Plain,
    RangedGet,
    Delete,
}

/// Classifies a terminal error kind into a statistics/trace bucket.
pub fn classify_error(kind: ErrorKind) -> OutcomeClass {
    use ErrorKind::*;
    match kind {
        Ok => OutcomeClass::Success200,
        AccessDenied | InvalidAccessKeyId | SignatureDoesNotMatch | InvalidSecurity => {
            OutcomeClass::Http403
        }
        NoSuchBucket | NoSuchKey | NoSuchUpload | NoSuchVersion => OutcomeClass::Http404,
        BucketAlreadyExists | BucketAlreadyOwnedByYou | BucketNotEmpty => OutcomeClass::Http409,
        InternalError | ServiceUnavailable | SlowDown => OutcomeClass::Http500,
        ConnectionFailed | NameLookupError | RequestTimeout => OutcomeClass::Network0,
        // DataCorruption is handled upstream by the worker (it never calls
        // this function for that kind); if it does slip through, treat it
        // like any other unrecognized service-side failure.
        DataCorruption | Other => OutcomeClass::Http400,
    }
}

/// Classifies a successful call into the right 2xx bucket.
pub fn classify_success(shape: SuccessShape) -> OutcomeClass {
    match shape {
        SuccessShape::Plain => OutcomeClass::Success200,
        SuccessShape::RangedGet => OutcomeClass::Success206,
        SuccessShape::Delete => OutcomeClass::Success204,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_403_family() {
        for kind in [
            ErrorKind::AccessDenied,
            ErrorKind::InvalidAccessKeyId,
            ErrorKind::SignatureDoesNotMatch,
            ErrorKind::InvalidSecurity,
        ] {
            assert_eq!(classify_error(kind), OutcomeClass::Http403);
        }
    }

    #[test]
    fn maps_404_family() {
        for kind in [
            ErrorKind::NoSuchBucket,
            ErrorKind::NoSuchKey,
            ErrorKind::NoSuchUpload,
            ErrorKind::NoSuchVersion,
        ] {
            assert_eq!(classify_error(kind), OutcomeClass::Http404);
        }
    }

    #[test]
    fn maps_409_family() {
        for kind in [
            ErrorKind::BucketAlreadyExists,
            ErrorKind::BucketAlreadyOwnedByYou,
            ErrorKind::BucketNotEmpty,
        ] {
            assert_eq!(classify_error(kind), OutcomeClass::Http409);
        }
    }

    #[test]
    fn maps_500_family() {
        for kind in [
            ErrorKind::InternalError,
            ErrorKind::ServiceUnavailable,
            ErrorKind::SlowDown,
        ] {
            assert_eq!(classify_error(kind), OutcomeClass::Http500);
        }
    }

    #[test]
    fn maps_network_family_to_class_zero() {
        for kind in [
            ErrorKind::ConnectionFailed,
            ErrorKind::NameLookupError,
            ErrorKind::RequestTimeout,
        ] {
            assert_eq!(classify_error(kind), OutcomeClass::Network0);
            assert_eq!(classify_error(kind).http_code(), 0);
        }
    }

    #[test]
    fn success_shapes_pick_distinct_classes() {
        assert_eq!(classify_success(SuccessShape::Plain), OutcomeClass::Success200);
        assert_eq!(classify_success(SuccessShape::RangedGet), OutcomeClass::Success206);
        assert_eq!(classify_success(SuccessShape::Delete), OutcomeClass::Success204);
    }
}
