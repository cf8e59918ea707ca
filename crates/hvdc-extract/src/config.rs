//! Configuration for the extraction engine.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Extraction settings.
///
/// Loaded from the `[extract]` section of `hvdc.toml` or `HVDC__EXTRACT__`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Sheets with more data rows than this skip the row-scan strategy.
    #[serde(default = "default_row_scan_limit")]
    pub row_scan_limit: usize,

    /// Joined row text is truncated to this many characters before scanning.
    #[serde(default = "default_row_text_limit")]
    pub row_text_limit: usize,

    /// Supplier name to short vendor code, used by the business-rule fallback.
    #[serde(default = "default_vendor_mapping")]
    pub vendor_mapping: BTreeMap<String, String>,

    /// Trusted document the lookup index is built from.
    #[serde(default)]
    pub lookup_source: Option<PathBuf>,

    /// File extensions picked up when scanning directories.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl ExtractConfig {
    /// Short vendor code for a supplier name, `UNK` when unmapped.
    pub fn vendor_code(&self, supplier: &str) -> &str {
        let supplier = supplier.trim();
        self.vendor_mapping
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(supplier))
            .map(|(_, code)| code.as_str())
            .unwrap_or("UNK")
    }

    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

fn default_row_scan_limit() -> usize {
    5000
}

fn default_row_text_limit() -> usize {
    2000
}

fn default_vendor_mapping() -> BTreeMap<String, String> {
    [
        ("Samsung Heavy Industries", "SHI"),
        ("LS Cable & System", "LSC"),
        ("Hyundai Electric", "HE"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_extensions() -> Vec<String> {
    vec!["xlsx".to_string(), "xlsm".to_string(), "csv".to_string()]
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            row_scan_limit: default_row_scan_limit(),
            row_text_limit: default_row_text_limit(),
            vendor_mapping: default_vendor_mapping(),
            lookup_source: None,
            extensions: default_extensions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractConfig::default();
        assert_eq!(config.row_scan_limit, 5000);
        assert_eq!(config.row_text_limit, 2000);
        assert!(config.lookup_source.is_none());
        assert!(config.accepts_extension("XLSX"));
        assert!(!config.accepts_extension("pdf"));
    }

    #[test]
    fn test_vendor_code_lookup() {
        let config = ExtractConfig::default();
        assert_eq!(config.vendor_code("LS Cable & System"), "LSC");
        assert_eq!(config.vendor_code(" hyundai electric "), "HE");
        assert_eq!(config.vendor_code("Acme Freight"), "UNK");
    }
}
