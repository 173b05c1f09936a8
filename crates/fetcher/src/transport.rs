//! HTTP transport port and its reqwest adapter.
//!
//! The transport never follows redirects; the fetcher walks redirect chains
//! itself so that every hop is validated before it is contacted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Url;

use crate::{GuardedResolver, TransportError};

/// HTTP method used by the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Size check.
    Head,
    /// Download.
    Get,
}

/// One outbound call.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    /// Method.
    pub method: Method,
    /// Already-validated target.
    pub url: &'a Url,
    /// Total time allowed for the call, body included.
    pub timeout: Duration,
    /// Largest body the transport may buffer.
    pub max_body_bytes: u64,
}

/// The parts of a response the fetcher inspects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// Status code.
    pub status: u16,
    /// Raw `Location` header.
    pub location: Option<String>,
    /// Parsed `Content-Length` header.
    pub content_length: Option<u64>,
    /// Raw `Content-Type` header.
    pub content_type: Option<String>,
    /// Body bytes. Empty for `HEAD` and for non-2xx responses.
    pub body: Vec<u8>,
}

/// Sends single HTTP requests without following redirects.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs `request`.
    async fn send(&self, request: TransportRequest<'_>)
        -> Result<TransportResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// reqwest adapter
// ---------------------------------------------------------------------------

/// [`HttpTransport`] over a rustls-backed `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with redirects disabled whose connections only reach
    /// addresses `resolver` permits.
    pub fn new(
        connect_timeout: Duration,
        resolver: GuardedResolver,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .dns_resolver(Arc::new(resolver))
            .connect_timeout(connect_timeout)
            .use_rustls_tls()
            .user_agent(concat!("folio-fetcher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest<'_>,
    ) -> Result<TransportResponse, TransportError> {
        let builder = match request.method {
            Method::Head => self.client.head(request.url.clone()),
            Method::Get => self.client.get(request.url.clone()),
        };
        let mut response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, request.timeout))?;

        let status = response.status().as_u16();
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        let location = header(LOCATION);
        let content_type = header(CONTENT_TYPE);
        let content_length = header(CONTENT_LENGTH).and_then(|v| v.trim().parse::<u64>().ok());

        let mut body = Vec::new();
        if request.method == Method::Get && (200..300).contains(&status) {
            if let Some(declared) = content_length {
                if declared > request.max_body_bytes {
                    return Err(TransportError::BodyTooLarge {
                        observed: declared,
                        limit: request.max_body_bytes,
                    });
                }
            }
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| map_reqwest_error(e, request.timeout))?
            {
                let observed = (body.len() + chunk.len()) as u64;
                if observed > request.max_body_bytes {
                    return Err(TransportError::BodyTooLarge {
                        observed,
                        limit: request.max_body_bytes,
                    });
                }
                body.extend_from_slice(&chunk);
            }
        }

        Ok(TransportResponse {
            status,
            location,
            content_length,
            content_type,
            body,
        })
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_body() || error.is_decode() {
        TransportError::Reset(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
