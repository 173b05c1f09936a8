//! Sub-command implementations.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use fetcher::{FetchRequest, SecureFetcher};
use pipeline::{
    build_cross_reference_context, build_required_elements_reminder,
    create_initial_section_write_state, get_uncovered_elements, mentioned_elements,
    CoverageConfig, CoverageTracker, Draft, FolioConfig, RequiredElement, SectionWriteState,
};
use tracing::info;

use crate::store::DirectoryStore;

/// Splits `markdown` into `##` sections and folds each into a coverage state.
pub fn track_coverage(
    markdown: &str,
    required: &[RequiredElement],
    config: &CoverageConfig,
) -> SectionWriteState {
    let tracker = CoverageTracker::new(config);
    let draft = Draft::from_markdown(markdown);
    draft
        .sections
        .iter()
        .fold(create_initial_section_write_state(), |state, section| {
            let mentioned = mentioned_elements(&section.body, required);
            let headline = if section.headline.is_empty() {
                draft.title.as_str()
            } else {
                section.headline.as_str()
            };
            tracker.update_section_write_state(&state, &section.body, headline, Some(&mentioned))
        })
}

/// Human-readable coverage report.
pub fn coverage_report(state: &SectionWriteState, required: &[RequiredElement]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Sections analysed: {}", state.sections_written);
    let context = build_cross_reference_context(state);
    if !context.is_empty() {
        let _ = writeln!(out, "\n{}", context.trim_end());
    }
    if !required.is_empty() {
        let reminder = build_required_elements_reminder(state, required, None);
        if reminder.is_empty() {
            let _ = writeln!(out, "\nAll {} required elements are covered.", required.len());
        } else {
            let _ = writeln!(out, "\n{}", reminder.trim_end());
        }
    }
    out
}

/// Parses a comma-separated element list, dropping blanks.
pub fn parse_required(raw: &str) -> Vec<RequiredElement> {
    raw.split(',').filter_map(RequiredElement::new).collect()
}

pub fn coverage(
    path: &Path,
    require: Option<&str>,
    json: bool,
    config: &FolioConfig,
) -> anyhow::Result<()> {
    let markdown = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let required = require.map(parse_required).unwrap_or_default();
    let state = track_coverage(&markdown, &required, &config.coverage);

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", coverage_report(&state, &required));
    }
    let missing = get_uncovered_elements(&state, &required);
    info!(
        sections = state.sections_written,
        topics = state.covered_topics.len(),
        missing = missing.len(),
        "Coverage analysed"
    );
    Ok(())
}

pub async fn fetch(url: &str, output: &Path, config: &FolioConfig) -> anyhow::Result<()> {
    let fetcher = SecureFetcher::with_defaults(&config.fetch).context("building HTTP client")?;
    let request = FetchRequest::from_settings(url, &config.fetch);
    let result = fetcher
        .download_image_with_retry(&request)
        .await
        .with_context(|| format!("fetching {url}"))?;
    tokio::fs::write(output, &result.bytes)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Saved {} bytes ({}) to {}",
        result.bytes.len(),
        result.media_type(),
        output.display()
    );
    Ok(())
}

pub async fn assets(markdown_path: &Path, dir: &Path, config: &FolioConfig) -> anyhow::Result<()> {
    let markdown = tokio::fs::read_to_string(markdown_path)
        .await
        .with_context(|| format!("reading {}", markdown_path.display()))?;
    let fetcher = SecureFetcher::with_defaults(&config.fetch).context("building HTTP client")?;
    let store = Arc::new(DirectoryStore::new(dir));

    let report = nodes::collect_assets(&fetcher, &markdown, store, &config.fetch).await;

    for asset in &report.stored {
        println!("stored  {} -> {}", asset.source_url, asset.location);
    }
    for failure in &report.failed {
        println!("failed  {}: {}", failure.source_url, failure.error);
    }
    println!(
        "{} stored, {} failed",
        report.stored.len(),
        report.failed.len()
    );
    Ok(())
}

/// Outcome of `check-url`.
#[derive(Debug, PartialEq, Eq)]
pub enum UrlVerdict {
    Allowed(String),
    Blocked(String),
}

pub async fn check_url(url: &str, config: &FolioConfig) -> anyhow::Result<UrlVerdict> {
    let fetcher = SecureFetcher::with_defaults(&config.fetch).context("building HTTP client")?;
    verdict(&fetcher, url).await
}

async fn verdict(fetcher: &SecureFetcher, url: &str) -> anyhow::Result<UrlVerdict> {
    match fetcher.validate(url).await {
        Ok(validated) => Ok(UrlVerdict::Allowed(validated.to_string())),
        Err(e) if e.is_security_rejection() => Ok(UrlVerdict::Blocked(e.to_string())),
        Err(e) => Err(e).with_context(|| format!("checking {url}")),
    }
}
