//! `[deploy]` configuration section.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    /// Classes the staging graph is expected to contain. Missing ones warn.
    #[serde(default = "default_required_classes")]
    pub required_classes: Vec<String>,
    /// Graph written when the caller names none.
    #[serde(default = "default_target_graph")]
    pub default_target_graph: String,
}

fn default_required_classes() -> Vec<String> {
    ["Case", "CargoItem", "Invoice", "HSCode"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_target_graph() -> String {
    "http://samsung.com/graph/EXTRACTED".to_string()
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            required_classes: default_required_classes(),
            default_target_graph: default_target_graph(),
        }
    }
}
