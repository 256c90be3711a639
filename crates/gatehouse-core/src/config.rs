use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::paths::GatehousePaths;

/// Project-level configuration loaded from `.gatehouse/config.toml`.
///
/// Every section and field has a default so a missing or partial file never
/// blocks operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub gates: GatesConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Gate sequencing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatesConfig {
    /// Minimum seconds between consecutive gate events for one work item.
    ///
    /// An anti-automation-momentum heuristic, not a security boundary;
    /// tune it as policy.
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: i64,

    /// Whether `gate sign` additionally scans the tracked corpus for the
    /// token (advisory; the audit ledger stays authoritative).
    #[serde(default = "default_true")]
    pub corpus_scan: bool,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            corpus_scan: default_true(),
        }
    }
}

/// Manifest verification policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Whether `Waiver:` fields may downgrade out-of-scope changes to
    /// warnings.
    #[serde(default = "default_true")]
    pub allow_waivers: bool,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            allow_waivers: default_true(),
        }
    }
}

/// Registry drift policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Reference revision providing the drift baseline.
    #[serde(default = "default_baseline_ref")]
    pub baseline_ref: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            baseline_ref: default_baseline_ref(),
        }
    }
}

/// User-level configuration (`<os-config-dir>/gatehouse/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Preferred output mode (`pretty`, `text`, or `json`).
    #[serde(default)]
    pub output: Option<String>,
}

/// Load the project config, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_project_config(paths: &GatehousePaths) -> Result<ProjectConfig> {
    load_toml_or_default(&paths.config_file())
}

/// Load the user config, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_toml_or_default(&config_dir.join("gatehouse/config.toml"))
}

fn load_toml_or_default<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str::<T>(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

const fn default_true() -> bool {
    true
}

const fn default_min_interval_secs() -> i64 {
    10
}

fn default_baseline_ref() -> String {
    "HEAD".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = GatehousePaths::new(dir.path());
        let cfg = load_project_config(&paths).expect("load should succeed");
        assert_eq!(cfg.gates.min_interval_secs, 10);
        assert!(cfg.gates.corpus_scan);
        assert!(cfg.manifest.allow_waivers);
        assert_eq!(cfg.registry.baseline_ref, "HEAD");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = dir.path().join(".gatehouse");
        std::fs::create_dir_all(&state).expect("state dir");
        std::fs::write(state.join("config.toml"), "[gates]\nmin_interval_secs = 0\n")
            .expect("write config");

        let paths = GatehousePaths::new(dir.path());
        let cfg = load_project_config(&paths).expect("load should succeed");
        assert_eq!(cfg.gates.min_interval_secs, 0);
        assert!(cfg.manifest.allow_waivers, "untouched section keeps default");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = dir.path().join(".gatehouse");
        std::fs::create_dir_all(&state).expect("state dir");
        std::fs::write(state.join("config.toml"), "gates = nonsense [").expect("write config");

        let paths = GatehousePaths::new(dir.path());
        assert!(load_project_config(&paths).is_err());
    }

    #[test]
    fn user_config_parses_output() {
        let cfg: UserConfig = toml::from_str("output = \"json\"\n").expect("parse");
        assert_eq!(cfg.output.as_deref(), Some("json"));
    }
}
