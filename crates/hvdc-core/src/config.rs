//! Layered configuration loading.
//!
//! Every binary reads its sections from (in priority order):
//! 1. Environment variables (`HVDC__<SECTION>__<KEY>`)
//! 2. Config file (`hvdc.toml`, or the prefix passed with `--config`)
//! 3. Per-field defaults on the section struct

use serde::de::DeserializeOwned;

use crate::error::HvdcError;

/// Environment variable prefix for every section.
pub const ENV_PREFIX: &str = "HVDC";

/// Default config file prefix.
pub const DEFAULT_FILE_PREFIX: &str = "hvdc";

/// Load one `[section]` from the layered sources.
///
/// A section absent from every source yields `T::default()`. A section that
/// is present but malformed is an error: silently falling back would deploy
/// against the wrong graph.
pub fn load_section<T>(file_prefix: &str, section: &str) -> Result<T, HvdcError>
where
    T: DeserializeOwned + Default,
{
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| HvdcError::Config(e.to_string()))?;

    match cfg.get::<T>(section) {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section, "Config section absent, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(HvdcError::Config(format!("[{section}]: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default = "default_limit")]
        limit: usize,
        #[serde(default)]
        name: String,
    }

    fn default_limit() -> usize {
        7
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                limit: default_limit(),
                name: String::new(),
            }
        }
    }

    #[test]
    fn missing_file_and_section_yield_default() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let s: Sample = load_section(prefix.to_str().unwrap(), "sample_missing").unwrap();
        assert_eq!(s, Sample::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hvdc.toml");
        std::fs::write(&path, "[sample_file]\nname = \"dsv\"\n").unwrap();
        let prefix = dir.path().join("hvdc");
        let s: Sample = load_section(prefix.to_str().unwrap(), "sample_file").unwrap();
        assert_eq!(s.name, "dsv");
        assert_eq!(s.limit, 7);
    }

    #[test]
    fn malformed_section_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bad.toml"),
            "[sample_bad]\nlimit = \"many\"\n",
        )
        .unwrap();
        let prefix = dir.path().join("bad");
        let err = load_section::<Sample>(prefix.to_str().unwrap(), "sample_bad").unwrap_err();
        assert!(matches!(err, HvdcError::Config(_)));
    }
}
