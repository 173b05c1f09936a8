//! Concurrent collection of images referenced by generated content.

use std::sync::Arc;

use fetcher::{image_references, FetchError, FetchRequest, SecureFetcher};
use pipeline::{AssetStore, CollaboratorError, FetchSettings};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Why one asset was not collected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssetError {
    /// The fetcher refused or failed the download.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The store rejected the payload.
    #[error("storing asset failed: {0}")]
    Store(#[source] CollaboratorError),
    /// The download task panicked or was cancelled.
    #[error("asset task aborted: {message}")]
    Aborted {
        /// Join diagnostic.
        message: String,
    },
}

/// A payload handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    /// URL as referenced in the document.
    pub source_url: String,
    /// Where the store put it.
    pub location: String,
    /// Detected media type.
    pub media_type: &'static str,
    /// Payload size.
    pub size_bytes: usize,
}

/// A reference that could not be collected.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetFailure {
    /// URL as referenced in the document.
    pub source_url: String,
    /// What went wrong.
    pub error: AssetError,
}

/// Outcome of [`collect_assets`], both lists in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetReport {
    /// Payloads the store accepted.
    pub stored: Vec<StoredAsset>,
    /// References that were not collected, with the reason.
    pub failed: Vec<AssetFailure>,
}

/// Fetches every image referenced in `markdown` concurrently, at most
/// `settings.max_concurrent` at a time, and stores the validated payloads.
/// Individual failures, panics included, are reported and never fatal.
pub async fn collect_assets(
    fetcher: &SecureFetcher,
    markdown: &str,
    store: Arc<dyn AssetStore>,
    settings: &FetchSettings,
) -> AssetReport {
    let references = image_references(markdown);
    let max_concurrent = settings.max_concurrent.max(1);
    info!(
        count = references.len(),
        max_concurrent, "Collecting referenced assets"
    );

    let permits = Arc::new(Semaphore::new(max_concurrent));
    let mut tasks = JoinSet::new();
    for (position, url) in references.into_iter().enumerate() {
        let request = FetchRequest::from_settings(url, settings);
        let source_url = request.url.clone();
        let one = collect_one(fetcher.clone(), store.clone(), request, permits.clone());
        tasks.spawn(async move { (position, source_url, one.await) });
    }

    let mut stored = Vec::new();
    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, _, Ok(asset))) => stored.push((position, asset)),
            Ok((position, source_url, Err(error))) => {
                warn!(url = %source_url, error = %error, "Asset not collected");
                failed.push((position, AssetFailure { source_url, error }));
            }
            Err(join_error) => error!(error = %join_error, "Asset task aborted"),
        }
    }
    stored.sort_by_key(|(position, _)| *position);
    failed.sort_by_key(|(position, _)| *position);

    AssetReport {
        stored: stored.into_iter().map(|(_, asset)| asset).collect(),
        failed: failed.into_iter().map(|(_, failure)| failure).collect(),
    }
}

/// Waits for a permit, then runs the download in its own task so a panic
/// comes back as [`AssetError::Aborted`] for this URL.
async fn collect_one(
    fetcher: SecureFetcher,
    store: Arc<dyn AssetStore>,
    request: FetchRequest,
    permits: Arc<Semaphore>,
) -> Result<StoredAsset, AssetError> {
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(closed) => {
            return Err(AssetError::Aborted {
                message: closed.to_string(),
            })
        }
    };
    let download =
        tokio::spawn(async move { fetch_and_store(&fetcher, store.as_ref(), &request).await });
    match download.await {
        Ok(result) => result,
        Err(join_error) => Err(AssetError::Aborted {
            message: join_error.to_string(),
        }),
    }
}

async fn fetch_and_store(
    fetcher: &SecureFetcher,
    store: &dyn AssetStore,
    request: &FetchRequest,
) -> Result<StoredAsset, AssetError> {
    let fetched = fetcher.download_image_with_retry(request).await?;
    let location = store
        .store(
            &request.url,
            &fetched.bytes,
            fetched.media_type(),
            fetched.format.extension(),
        )
        .await
        .map_err(AssetError::Store)?;
    Ok(StoredAsset {
        source_url: request.url.clone(),
        location,
        media_type: fetched.media_type(),
        size_bytes: fetched.bytes.len(),
    })
}
