//! Configuration loading.

use std::path::Path;

use anyhow::Context;
use pipeline::FolioConfig;
use tracing::debug;

/// Loads and validates the TOML configuration at `path`.
///
/// A missing file yields the defaults; a present but unreadable or invalid
/// file is an error.
pub fn load_config(path: &Path) -> anyhow::Result<FolioConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "No configuration file; using defaults");
        return Ok(FolioConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration from {}", path.display()))?;
    let config: FolioConfig = toml::from_str(&raw)
        .with_context(|| format!("parsing configuration in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating configuration in {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("folio.toml")).unwrap();
        assert_eq!(config, FolioConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fetch]\nmax_size_bytes = 2048\n\n[retry]\nmax_retries = 0").unwrap();

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.fetch.max_size_bytes, 2048);
        assert_eq!(config.retry.max_retries, 0);
        assert!(config.fetch.check_size_first);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[coverage]\nmin_topic_chars = 10\nmax_topic_chars = 5").unwrap();

        let err = load_config(file.path()).unwrap_err();

        assert!(format!("{err:#}").contains("min_topic_chars"));
    }

    #[test]
    fn malformed_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fetch\nmax_size_bytes = ").unwrap();

        assert!(load_config(file.path()).is_err());
    }
}
