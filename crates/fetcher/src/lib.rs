//! Folio secure asset fetcher.
//!
//! Downloads images referenced by generated content from untrusted URLs
//! without letting those URLs reach internal infrastructure.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Network I/O lives here behind two ports,
//! [`HttpTransport`] and [`HostResolver`], so the validation logic in
//! [`SecureFetcher`] can be exercised without a network. The reqwest client
//! resolves through a [`GuardedResolver`], so the address rules also apply
//! to the lookup made at connect time. Retries use the
//! [`pipeline`] retry executor and clock.
//!
//! ## Failure classes
//!
//! See [`FetchErrorKind`]: security rejections and validation failures are
//! final; transient failures are retried by
//! [`SecureFetcher::download_image_with_retry`]. Security rejections are
//! logged at `warn` under the `folio::security` target.

pub mod assets;
pub mod error;
pub mod fetcher;
pub mod magic;
pub mod resolver;
pub mod ssrf;
pub mod transport;

pub use assets::image_references;
pub use error::{FetchError, FetchErrorKind, ResolveError, TransportError};
pub use fetcher::{FetchRequest, FetchResult, SecureFetcher, MAX_REDIRECTS};
pub use magic::ImageFormat;
pub use resolver::{GuardedResolver, HostResolver, TokioResolver};
pub use ssrf::{blocked_reason, is_blocked_hostname, validate_url, ValidatedUrl};
pub use transport::{
    HttpTransport, Method, ReqwestTransport, TransportRequest, TransportResponse,
};
