//! The secure fetcher.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{retry_with_backoff, Clock, FetchSettings, RetryStrategy, SystemClock};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::ssrf::{blocked_reason, validate_url};
use crate::transport::{Method, TransportRequest, TransportResponse};
use crate::{
    FetchError, GuardedResolver, HostResolver, HttpTransport, ImageFormat, ReqwestTransport,
    ResolveError, TokioResolver, TransportError,
};

/// Maximum redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// Parameters for one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Target URL.
    pub url: String,
    /// Largest accepted payload in bytes.
    pub max_size_bytes: u64,
    /// Check the declared size with `HEAD` before downloading.
    pub check_size_first: bool,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Retries for transient failures (used by
    /// [`SecureFetcher::download_image_with_retry`]).
    pub retries: u32,
    /// Delay after the first transient failure.
    pub initial_backoff: Duration,
}

impl FetchRequest {
    /// A request for `url` with default limits.
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_settings(url, &FetchSettings::default())
    }

    /// A request for `url` using configured limits.
    pub fn from_settings(url: impl Into<String>, settings: &FetchSettings) -> Self {
        Self {
            url: url.into(),
            max_size_bytes: settings.max_size_bytes,
            check_size_first: settings.check_size_first,
            timeout: Duration::from_millis(settings.timeout_ms),
            retries: settings.retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
        }
    }

    /// Overrides the size limit.
    pub fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    /// Enables or disables the `HEAD` size check.
    pub fn with_size_check(mut self, enabled: bool) -> Self {
        self.check_size_first = enabled;
        self
    }

    /// Overrides the retry budget.
    pub fn with_retries(mut self, retries: u32, initial_backoff: Duration) -> Self {
        self.retries = retries;
        self.initial_backoff = initial_backoff;
        self
    }
}

/// A validated image payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Payload bytes.
    pub bytes: Vec<u8>,
    /// Format detected from the payload.
    pub format: ImageFormat,
    /// `Content-Type` the server declared, if any.
    pub declared_content_type: Option<String>,
    /// URL that served the payload after redirects.
    pub final_url: String,
}

impl FetchResult {
    /// Media type derived from the detected format.
    pub fn media_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

// ---------------------------------------------------------------------------
// SecureFetcher
// ---------------------------------------------------------------------------

/// Downloads images from untrusted URLs.
///
/// Guarantees, per call:
///
/// - no network call is made before the URL passes [`validate_url`] and every
///   address its host resolves to is public;
/// - each redirect target is validated the same way, up to [`MAX_REDIRECTS`]
///   hops;
/// - no more than `max_size_bytes` are ever buffered;
/// - the payload starts with a recognised image signature.
///
/// A resolved address is checked but not pinned for the connection that
/// follows, so a resolver that changes its answer between the check and the
/// connect is not defended against here.
#[derive(Clone)]
pub struct SecureFetcher {
    transport: Arc<dyn HttpTransport>,
    resolver: Arc<dyn HostResolver>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SecureFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureFetcher").finish_non_exhaustive()
    }
}

impl SecureFetcher {
    /// Wires a fetcher from explicit ports.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        resolver: Arc<dyn HostResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            resolver,
            clock,
        }
    }

    /// Production wiring: reqwest, the system resolver, and the system clock.
    pub fn with_defaults(settings: &FetchSettings) -> Result<Self, TransportError> {
        let resolver: Arc<dyn HostResolver> = Arc::new(TokioResolver);
        let transport = ReqwestTransport::new(
            Duration::from_millis(settings.connect_timeout_ms),
            GuardedResolver::new(resolver.clone()),
        )?;
        Ok(Self::new(Arc::new(transport), resolver, Arc::new(SystemClock)))
    }

    /// Validates `raw` completely, resolving its host when it is a name.
    pub async fn validate(&self, raw: &str) -> Result<Url, FetchError> {
        let validated = validate_url(raw).inspect_err(log_rejection)?;
        let Some(host) = validated.pending_host else {
            return Ok(validated.url);
        };

        let port = validated.url.port_or_known_default().unwrap_or(80);
        let addresses = self.resolver.resolve(&host, port).await?;
        if addresses.is_empty() {
            return Err(FetchError::Resolution(ResolveError {
                host,
                message: "no addresses returned".into(),
            }));
        }
        for ip in addresses {
            if let Some(reason) = blocked_reason(ip) {
                let err = FetchError::Blocked {
                    url: raw.to_string(),
                    reason: format!("host '{host}' resolves to {ip}, a {reason}"),
                };
                log_rejection(&err);
                return Err(err);
            }
        }
        Ok(validated.url)
    }

    /// Downloads one image with no retries.
    pub async fn download_image(&self, request: &FetchRequest) -> Result<FetchResult, FetchError> {
        let mut current = self.validate(&request.url).await?;

        if request.check_size_first {
            self.check_declared_size(&current, request).await?;
        }

        let mut hops = 0;
        let response = loop {
            let response = self.call(Method::Get, &current, request).await?;
            if !is_followed_redirect(response.status) {
                break response;
            }
            let location = response.location.ok_or_else(|| FetchError::MissingLocation {
                url: current.to_string(),
            })?;
            if hops >= MAX_REDIRECTS {
                return Err(FetchError::TooManyRedirects {
                    limit: MAX_REDIRECTS,
                });
            }
            hops += 1;
            let next = current
                .join(location.trim())
                .map_err(|e| FetchError::InvalidUrl {
                    url: location.clone(),
                    message: e.to_string(),
                })?;
            debug!(from = %current, to = %next, hop = hops, "Following redirect");
            current = self.validate(next.as_str()).await?;
        };

        if !(200..300).contains(&response.status) {
            return Err(FetchError::HttpStatus {
                status: response.status,
                url: current.to_string(),
            });
        }

        let Some(format) = ImageFormat::detect(&response.body) else {
            return Err(FetchError::NotAnImage {
                declared: response
                    .content_type
                    .unwrap_or_else(|| "none".to_string()),
            });
        };
        info!(
            url = %current,
            bytes = response.body.len(),
            format = format.mime_type(),
            "Image downloaded"
        );
        Ok(FetchResult {
            bytes: response.body,
            format,
            declared_content_type: response.content_type,
            final_url: current.to_string(),
        })
    }

    /// Downloads one image, retrying transient failures with exponential
    /// backoff. Security and validation failures are returned at once.
    pub async fn download_image_with_retry(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResult, FetchError> {
        let strategy = RetryStrategy::exponential(request.retries, request.initial_backoff);
        retry_with_backoff(&strategy, self.clock.as_ref(), "download_image", move |_| {
            self.download_image(request)
        })
        .await
    }

    /// `HEAD` request. Only a 2xx answer that declares an oversized body fails;
    /// anything else is inconclusive and the download proceeds.
    async fn check_declared_size(&self, url: &Url, request: &FetchRequest) -> Result<(), FetchError> {
        let response = self.call(Method::Head, url, request).await?;
        if !(200..300).contains(&response.status) {
            debug!(url = %url, status = response.status, "Size check inconclusive");
            return Ok(());
        }
        match response.content_length {
            Some(size) if size > request.max_size_bytes => Err(FetchError::TooLarge {
                size,
                limit: request.max_size_bytes,
            }),
            _ => Ok(()),
        }
    }

    async fn call(
        &self,
        method: Method,
        url: &Url,
        request: &FetchRequest,
    ) -> Result<TransportResponse, FetchError> {
        let outbound = TransportRequest {
            method,
            url,
            timeout: request.timeout,
            max_body_bytes: request.max_size_bytes,
        };
        self.transport
            .send(outbound)
            .await
            .map_err(|source| match source {
                TransportError::BodyTooLarge { observed, limit } => FetchError::TooLarge {
                    size: observed,
                    limit,
                },
                source => FetchError::Transient {
                    url: url.to_string(),
                    source,
                },
            })
    }
}

fn is_followed_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

fn log_rejection(err: &FetchError) {
    if let FetchError::Blocked { url, reason } = err {
        warn!(target: "folio::security", url = %url, reason = %reason, "Blocked outbound fetch");
    }
}
