//! Configuration management for pumpgraph services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`PUMPGRAPH__` prefix, `__` separator)
//! 2. Config file (`pumpgraph.toml`, or any prefix passed on the command line)
//! 3. Defaults provided by each section type

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Prefix for environment overrides, e.g. `PUMPGRAPH__STATION__SEARCH_TOP_K=5`.
pub const ENV_PREFIX: &str = "PUMPGRAPH";

/// Default config file prefix (resolved to `pumpgraph.toml`, `.yaml`, ...).
pub const DEFAULT_FILE_PREFIX: &str = "pumpgraph";

/// Build the layered configuration. A missing file is not an error.
pub fn load(file_prefix: &str) -> Result<config::Config> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

/// Deserialize one top-level section, falling back to its default when the
/// section is absent. A present but malformed section is an error.
pub fn section<T>(cfg: &config::Config, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match cfg.get::<T>(key) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section = key, "Config section absent, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default = "default_name")]
        name: String,
        #[serde(default)]
        limit: u32,
    }

    fn default_name() -> String {
        "dgraph".to_string()
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                name: default_name(),
                limit: 0,
            }
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let cfg = load(prefix.to_str().unwrap()).unwrap();

        let sample: Sample = section(&cfg, "sample_missing").unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn test_file_section_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pumpgraph.toml");
        std::fs::write(&path, "[sample]\nname = \"alpha\"\nlimit = 7\n").unwrap();

        let prefix = dir.path().join("pumpgraph");
        let cfg = load(prefix.to_str().unwrap()).unwrap();
        let sample: Sample = section(&cfg, "sample").unwrap();

        assert_eq!(sample.name, "alpha");
        assert_eq!(sample.limit, 7);
    }

    #[test]
    fn test_malformed_section_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[sample]\nlimit = \"many\"\n").unwrap();

        let prefix = dir.path().join("bad");
        let cfg = load(prefix.to_str().unwrap()).unwrap();
        assert!(section::<Sample>(&cfg, "sample").is_err());
    }
}
