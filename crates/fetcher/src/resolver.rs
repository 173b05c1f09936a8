//! Host name resolution: the lookup port, the system resolver, and the
//! connect-time guard installed into the HTTP client.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::warn;

use crate::{blocked_reason, ResolveError};

/// Resolves host names to the addresses a connection could reach.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Returns every address `host` resolves to.
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Resolver backed by the system resolver via `tokio::net::lookup_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioResolver;

#[async_trait]
impl HostResolver for TokioResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, ResolveError> {
        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ResolveError {
                host: host.to_string(),
                message: e.to_string(),
            })?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

// ---------------------------------------------------------------------------
// Connect-time guard
// ---------------------------------------------------------------------------

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// DNS resolver for the reqwest client.
///
/// The client looks a host up again when it connects, after
/// [`SecureFetcher::validate`](crate::SecureFetcher::validate) checked it.
/// Blocked addresses are dropped from that second answer too, so a record
/// that changed in between (DNS rebinding) cannot reach internal addresses.
#[derive(Clone)]
pub struct GuardedResolver {
    inner: Arc<dyn HostResolver>,
}

impl GuardedResolver {
    pub fn new(inner: Arc<dyn HostResolver>) -> Self {
        Self { inner }
    }

    /// Resolves `host`, keeping only permitted addresses. Fails when none
    /// are left.
    pub async fn lookup(&self, host: &str) -> Result<Vec<SocketAddr>, ResolveError> {
        let answers = self.inner.resolve(host, 0).await?;
        let mut permitted = Vec::with_capacity(answers.len());
        for ip in answers {
            match blocked_reason(ip) {
                Some(reason) => warn!(
                    target: "folio::security",
                    host,
                    %ip,
                    reason,
                    "Dropped blocked address at connect time"
                ),
                // reqwest replaces the port with the URL's.
                None => permitted.push(SocketAddr::new(ip, 0)),
            }
        }
        if permitted.is_empty() {
            return Err(ResolveError {
                host: host.to_string(),
                message: "every resolved address is blocked".into(),
            });
        }
        Ok(permitted)
    }
}

impl std::fmt::Debug for GuardedResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedResolver").finish_non_exhaustive()
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            match resolver.lookup(name.as_str()).await {
                Ok(addrs) => Ok(Box::new(addrs.into_iter()) as Addrs),
                Err(e) => Err(Box::new(e) as BoxError),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Answers(Vec<&'static str>);

    #[async_trait]
    impl HostResolver for Answers {
        async fn resolve(&self, _host: &str, _port: u16) -> Result<Vec<IpAddr>, ResolveError> {
            Ok(self.0.iter().map(|ip| ip.parse().unwrap()).collect())
        }
    }

    fn guard(answers: Vec<&'static str>) -> GuardedResolver {
        GuardedResolver::new(Arc::new(Answers(answers)))
    }

    #[tokio::test]
    async fn rebinding_to_loopback_or_metadata_is_refused() {
        let err = guard(vec!["127.0.0.1", "169.254.169.254"])
            .lookup("evil.example")
            .await
            .unwrap_err();
        assert_eq!(err.host, "evil.example");
        assert!(err.message.contains("blocked"));

        assert!(guard(vec!["::1", "fd00:ec2::254"])
            .lookup("evil.example")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn blocked_answers_are_dropped_and_public_ones_kept() {
        let addrs = guard(vec!["10.0.0.7", "93.184.216.34", "::ffff:127.0.0.1"])
            .lookup("cdn.example")
            .await
            .unwrap();
        assert_eq!(addrs, vec!["93.184.216.34:0".parse::<SocketAddr>().unwrap()]);
    }
}
