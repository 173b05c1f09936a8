use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fetcher::{
    FetchError, FetchErrorKind, FetchRequest, HostResolver, HttpTransport, ImageFormat, Method,
    ResolveError, SecureFetcher, TransportError, TransportRequest, TransportResponse,
    MAX_REDIRECTS,
};
use pipeline::ManualClock;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Replays scripted responses in order and records every call.
#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, method: Method) -> usize {
        self.calls().iter().filter(|(m, _)| *m == method).count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(
        &self,
        request: TransportRequest<'_>,
    ) -> Result<TransportResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.method, request.url.to_string()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
    }
}

/// Resolves from a fixed table; unknown hosts fail.
#[derive(Default)]
struct TableResolver {
    table: HashMap<String, Vec<IpAddr>>,
    lookups: Mutex<u32>,
}

impl TableResolver {
    fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        let mut table: HashMap<String, Vec<IpAddr>> = HashMap::new();
        for (host, ip) in entries {
            table
                .entry(host.to_string())
                .or_default()
                .push(ip.parse().unwrap());
        }
        Arc::new(Self {
            table,
            lookups: Mutex::new(0),
        })
    }

    fn lookups(&self) -> u32 {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl HostResolver for TableResolver {
    async fn resolve(&self, host: &str, _port: u16) -> Result<Vec<IpAddr>, ResolveError> {
        *self.lookups.lock().unwrap() += 1;
        self.table.get(host).cloned().ok_or_else(|| ResolveError {
            host: host.to_string(),
            message: "NXDOMAIN".into(),
        })
    }
}

fn ok_image(bytes: &[u8], content_type: &str) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status: 200,
        content_length: Some(bytes.len() as u64),
        content_type: Some(content_type.to_string()),
        body: bytes.to_vec(),
        ..TransportResponse::default()
    })
}

fn head(status: u16, content_length: Option<u64>) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status,
        content_length,
        ..TransportResponse::default()
    })
}

fn redirect(location: &str) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status: 302,
        location: Some(location.to_string()),
        ..TransportResponse::default()
    })
}

fn reset() -> Result<TransportResponse, TransportError> {
    Err(TransportError::Reset("connection reset by peer".into()))
}

struct Harness {
    fetcher: SecureFetcher,
    transport: Arc<ScriptedTransport>,
    resolver: Arc<TableResolver>,
    clock: Arc<ManualClock>,
}

fn harness(script: Vec<Result<TransportResponse, TransportError>>) -> Harness {
    let transport = ScriptedTransport::new(script);
    let resolver = TableResolver::with(&[
        ("cdn.example", "93.184.216.34"),
        ("mirror.example", "93.184.216.35"),
        ("internal.example", "10.0.0.7"),
        ("mixed.example", "93.184.216.36"),
        ("mixed.example", "127.0.0.1"),
    ]);
    let clock = Arc::new(ManualClock::new());
    let fetcher = SecureFetcher::new(transport.clone(), resolver.clone(), clock.clone());
    Harness {
        fetcher,
        transport,
        resolver,
        clock,
    }
}

fn skip_size_check(url: &str) -> FetchRequest {
    FetchRequest::new(url).with_size_check(false)
}

// ---------------------------------------------------------------------------
// Request forgery defence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocked_literal_address_makes_no_network_call() {
    let h = harness(vec![ok_image(JPEG, "image/jpeg")]);

    let err = h
        .fetcher
        .download_image_with_retry(&FetchRequest::new("http://169.254.169.254/latest/meta-data"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Security);
    assert!(h.transport.calls().is_empty());
    assert_eq!(h.resolver.lookups(), 0);
    assert!(h.clock.recorded_sleeps().is_empty());
}

#[tokio::test]
async fn host_resolving_to_private_address_is_blocked_before_connecting() {
    let h = harness(vec![ok_image(JPEG, "image/jpeg")]);

    let err = h
        .fetcher
        .download_image(&FetchRequest::new("https://internal.example/a.jpg"))
        .await
        .unwrap_err();

    assert!(err.is_security_rejection(), "{err}");
    assert_eq!(h.resolver.lookups(), 1);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn any_blocked_address_in_the_answer_rejects_the_host() {
    let h = harness(vec![ok_image(JPEG, "image/jpeg")]);

    let err = h
        .fetcher
        .download_image(&FetchRequest::new("https://mixed.example/a.jpg"))
        .await
        .unwrap_err();

    assert!(err.is_security_rejection());
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn redirect_to_private_address_is_blocked() {
    let h = harness(vec![
        redirect("http://10.0.0.5/internal.png"),
        ok_image(PNG, "image/png"),
    ]);

    let err = h
        .fetcher
        .download_image(&skip_size_check("https://cdn.example/a.png"))
        .await
        .unwrap_err();

    assert!(err.is_security_rejection(), "{err}");
    assert_eq!(h.transport.calls().len(), 1);
}

#[tokio::test]
async fn dns_failure_is_transient_and_retried() {
    let h = harness(vec![]);
    let request = skip_size_check("https://unknown.example/a.png")
        .with_retries(2, Duration::from_millis(100));

    let err = h
        .fetcher
        .download_image_with_retry(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Resolution(_)));
    assert_eq!(err.kind(), FetchErrorKind::Transient);
    assert_eq!(h.resolver.lookups(), 3);
    assert!(h.transport.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Size limits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_declared_size_fails_without_downloading() {
    let h = harness(vec![head(200, Some(15_000_000)), ok_image(JPEG, "image/jpeg")]);

    let err = h
        .fetcher
        .download_image(&FetchRequest::new("https://cdn.example/huge.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::TooLarge {
            size: 15_000_000,
            limit: 10_485_760
        }
    ));
    assert_eq!(h.transport.count(Method::Head), 1);
    assert_eq!(h.transport.count(Method::Get), 0);
}

#[tokio::test]
async fn inconclusive_size_check_proceeds_to_download() {
    let h = harness(vec![head(405, None), ok_image(JPEG, "image/jpeg")]);

    let result = h
        .fetcher
        .download_image(&FetchRequest::new("https://cdn.example/a.jpg"))
        .await
        .unwrap();

    assert_eq!(result.format, ImageFormat::Jpeg);
    assert_eq!(h.transport.count(Method::Head), 1);
    assert_eq!(h.transport.count(Method::Get), 1);
}

#[tokio::test]
async fn body_over_the_cap_is_too_large_and_not_retried() {
    let h = harness(vec![Err(TransportError::BodyTooLarge {
        observed: 2_048,
        limit: 1_024,
    })]);
    let request = skip_size_check("https://cdn.example/a.jpg").with_max_size(1_024);

    let err = h
        .fetcher
        .download_image_with_retry(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::TooLarge { limit: 1_024, .. }));
    assert_eq!(h.transport.calls().len(), 1);
}

// ---------------------------------------------------------------------------
// Content validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signature_wins_over_declared_content_type() {
    let h = harness(vec![ok_image(JPEG, "text/html")]);

    let result = h
        .fetcher
        .download_image(&skip_size_check("https://cdn.example/a"))
        .await
        .unwrap();

    assert_eq!(result.format, ImageFormat::Jpeg);
    assert_eq!(result.media_type(), "image/jpeg");
    assert_eq!(result.declared_content_type.as_deref(), Some("text/html"));
    assert_eq!(result.bytes, JPEG);
}

#[tokio::test]
async fn html_declared_as_image_is_rejected() {
    let h = harness(vec![ok_image(b"<!doctype html><p>hi</p>", "image/jpeg")]);

    let err = h
        .fetcher
        .download_image(&skip_size_check("https://cdn.example/a.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::NotAnImage { ref declared } if declared == "image/jpeg"));
    assert!(err.to_string().contains("not a valid image"));
}

#[tokio::test]
async fn arbitrary_bytes_are_not_an_image_and_not_retried() {
    let h = harness(vec![ok_image(&[0x00, 0x01, 0x02, 0x03], "image/png")]);

    let err = h
        .fetcher
        .download_image_with_retry(&skip_size_check("https://cdn.example/b.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::NotAnImage { ref declared } if declared == "image/png"));
    assert_eq!(err.kind(), FetchErrorKind::Validation);
    assert_eq!(h.transport.calls().len(), 1);
    assert!(h.clock.recorded_sleeps().is_empty());
}

#[tokio::test]
async fn error_status_is_final() {
    let h = harness(vec![Ok(TransportResponse {
        status: 404,
        ..TransportResponse::default()
    })]);

    let err = h
        .fetcher
        .download_image_with_retry(&skip_size_check("https://cdn.example/missing.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
    assert_eq!(h.transport.calls().len(), 1);
    assert!(h.clock.recorded_sleeps().is_empty());
}

// ---------------------------------------------------------------------------
// Redirects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn relative_redirect_is_resolved_against_the_current_url() {
    let h = harness(vec![
        redirect("/images/real.png"),
        redirect("https://mirror.example/final.png"),
        ok_image(PNG, "image/png"),
    ]);

    let result = h
        .fetcher
        .download_image(&skip_size_check("https://cdn.example/start.png"))
        .await
        .unwrap();

    assert_eq!(result.final_url, "https://mirror.example/final.png");
    let urls: Vec<String> = h.transport.calls().into_iter().map(|(_, u)| u).collect();
    assert_eq!(
        urls,
        vec![
            "https://cdn.example/start.png",
            "https://cdn.example/images/real.png",
            "https://mirror.example/final.png",
        ]
    );
}

#[tokio::test]
async fn long_redirect_chain_stops_at_the_limit() {
    let script = (1..=10)
        .map(|hop| redirect(&format!("https://cdn.example/hop/{hop}")))
        .collect();
    let h = harness(script);

    let err = h
        .fetcher
        .download_image(&skip_size_check("https://cdn.example/start"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::TooManyRedirects { limit: 5 }));
    assert_eq!(h.transport.count(Method::Get), MAX_REDIRECTS + 1);
}

#[tokio::test]
async fn redirect_without_location_fails() {
    let h = harness(vec![Ok(TransportResponse {
        status: 301,
        ..TransportResponse::default()
    })]);

    let err = h
        .fetcher
        .download_image(&skip_size_check("https://cdn.example/a.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::MissingLocation { .. }));
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let h = harness(vec![reset(), reset(), ok_image(PNG, "image/png")]);
    let request =
        skip_size_check("https://cdn.example/a.png").with_retries(3, Duration::from_millis(1_000));

    let result = h.fetcher.download_image_with_retry(&request).await.unwrap();

    assert_eq!(result.format, ImageFormat::Png);
    assert_eq!(h.transport.calls().len(), 3);
    assert_eq!(
        h.clock.recorded_sleeps(),
        vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]
    );
}

#[tokio::test]
async fn size_check_failure_counts_as_a_failed_attempt() {
    let h = harness(vec![
        Err(TransportError::Timeout(Duration::from_secs(30))),
        head(200, Some(128)),
        ok_image(JPEG, "image/jpeg"),
    ]);
    let request = FetchRequest::new("https://cdn.example/a.jpg")
        .with_retries(1, Duration::from_millis(250));

    let result = h.fetcher.download_image_with_retry(&request).await.unwrap();

    assert_eq!(result.format, ImageFormat::Jpeg);
    assert_eq!(h.transport.count(Method::Head), 2);
    assert_eq!(h.transport.count(Method::Get), 1);
    assert_eq!(h.clock.recorded_sleeps(), vec![Duration::from_millis(250)]);
}

#[tokio::test]
async fn retries_are_bounded() {
    let h = harness(vec![reset(), reset(), reset(), reset()]);
    let request =
        skip_size_check("https://cdn.example/a.png").with_retries(2, Duration::from_millis(10));

    let err = h
        .fetcher
        .download_image_with_retry(&request)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Transient);
    assert_eq!(h.transport.calls().len(), 3);
}
