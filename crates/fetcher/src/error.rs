//! Error types for the secure fetcher and its ports.
//!
//! [`FetchError::kind`] sorts every failure into one of three classes so
//! callers can route security events separately from flaky-network noise:
//!
//! | Kind | Retried | Examples |
//! |------|---------|----------|
//! | [`FetchErrorKind::Security`] | never | private or metadata address, disallowed scheme |
//! | [`FetchErrorKind::Validation`] | never | oversized payload, bad signature, non-2xx, redirect loop |
//! | [`FetchErrorKind::Transient`] | yes | connection reset, timeout, DNS failure |

use std::time::Duration;

use pipeline::{RetryPolicy, Retryable};
use thiserror::Error;

/// Failure reported by an [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection dropped mid-exchange.
    #[error("connection reset: {0}")]
    Reset(String),

    /// The call exceeded its timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The response body grew past the caller's cap.
    #[error("response body of at least {observed} bytes exceeds the {limit}-byte cap")]
    BodyTooLarge {
        /// Bytes declared or received when the cap was hit.
        observed: u64,
        /// The cap.
        limit: u64,
    },

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Failure reported by a [`HostResolver`](crate::HostResolver).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("could not resolve '{host}': {message}")]
pub struct ResolveError {
    /// Host name that failed to resolve.
    pub host: String,
    /// Resolver diagnostic.
    pub message: String,
}

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Request forgery defence rejected the target.
    Security,
    /// The target answered, but not with an acceptable image.
    Validation,
    /// The network misbehaved; retrying may help.
    Transient,
}

/// Errors returned by [`SecureFetcher`](crate::SecureFetcher).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// The target (or a redirect target) is not allowed.
    #[error("Blocked request to '{url}': {reason}")]
    Blocked {
        /// The rejected URL.
        url: String,
        /// Which rule rejected it.
        reason: String,
    },

    /// The URL could not be parsed.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The offending input.
        url: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The declared or received size exceeds the limit.
    #[error("Resource too large: {size} bytes exceeds the {limit}-byte limit")]
    TooLarge {
        /// Declared or observed size.
        size: u64,
        /// The configured limit.
        limit: u64,
    },

    /// The redirect chain is longer than allowed.
    #[error("Too many redirects (limit {limit})")]
    TooManyRedirects {
        /// Maximum hops followed.
        limit: usize,
    },

    /// A redirect response carried no usable `Location` header.
    #[error("Redirect from '{url}' has no Location header")]
    MissingLocation {
        /// URL that answered with the redirect.
        url: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP status {status} from '{url}'")]
    HttpStatus {
        /// The status code.
        status: u16,
        /// URL that answered.
        url: String,
    },

    /// The payload does not start with a known image signature.
    #[error("Response is not a valid image (declared content type: {declared})")]
    NotAnImage {
        /// Content type the server claimed, or `"none"`.
        declared: String,
    },

    /// The host name could not be resolved.
    #[error("DNS resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// A network call failed transiently.
    #[error("Transient failure fetching '{url}': {source}")]
    Transient {
        /// URL being fetched.
        url: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
}

impl FetchError {
    /// Classifies this error.
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Blocked { .. } => FetchErrorKind::Security,
            FetchError::Resolution(_) | FetchError::Transient { .. } => FetchErrorKind::Transient,
            FetchError::InvalidUrl { .. }
            | FetchError::TooLarge { .. }
            | FetchError::TooManyRedirects { .. }
            | FetchError::MissingLocation { .. }
            | FetchError::HttpStatus { .. }
            | FetchError::NotAnImage { .. } => FetchErrorKind::Validation,
        }
    }

    /// `true` for request forgery rejections.
    pub fn is_security_rejection(&self) -> bool {
        self.kind() == FetchErrorKind::Security
    }
}

impl Retryable for FetchError {
    fn retry_policy(&self) -> RetryPolicy {
        match self.kind() {
            FetchErrorKind::Transient => RetryPolicy::Retryable { after: None },
            FetchErrorKind::Security | FetchErrorKind::Validation => RetryPolicy::NonRetryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        let transient = FetchError::Transient {
            url: "https://cdn.example/a.png".into(),
            source: TransportError::Reset("peer".into()),
        };
        let blocked = FetchError::Blocked {
            url: "http://127.0.0.1/".into(),
            reason: "loopback address".into(),
        };
        let too_large = FetchError::TooLarge {
            size: 2,
            limit: 1,
        };
        assert!(transient.retry_policy().is_retryable());
        assert!(!blocked.retry_policy().is_retryable());
        assert!(!too_large.retry_policy().is_retryable());
        assert!(blocked.is_security_rejection());
        assert_eq!(too_large.kind(), FetchErrorKind::Validation);
    }

    #[test]
    fn messages_name_the_failure() {
        let err = FetchError::NotAnImage {
            declared: "image/jpeg".into(),
        };
        assert!(err.to_string().contains("not a valid image"));
        assert!(FetchError::TooManyRedirects { limit: 5 }
            .to_string()
            .contains("Too many redirects"));
    }
}
