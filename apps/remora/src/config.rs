//! # Configuration
//!
//! Host settings from an optional TOML file plus environment overrides.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. `remora.toml` in the working directory, or the file given with `--config`
//! 3. Environment: `REMORA_REGISTRY_URL`, `REMORA_HTTP_TIMEOUT_SECS`
//!
//! ## File Layout
//!
//! ```toml
//! [registry]
//! base_url = "https://components.example.com"
//! timeout_secs = 10
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [[site]]
//! id = "navbar"
//! component = "Navbar"
//! host = ["Button", "Bell"]
//! uses = { DropUser = "drop-user" }
//! constants = { title = "Staff" }
//! ```

use remora_core::RemoraError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Config file looked up in the working directory when no path is given.
pub const CONFIG_FILE: &str = "remora.toml";

/// Default HTTP timeout for the manifest fetch, in seconds.
///
/// `0`: no timeout unless the operator sets one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 0;

// =============================================================================
// SETTINGS
// =============================================================================

/// All host settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub registry: RegistrySettings,
    pub server: ServerSettings,
    /// Request sites served by the host. Empty means the built-in layout.
    #[serde(rename = "site")]
    pub sites: Vec<SiteSettings>,
}

/// Where the manifest comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
    /// Base URL; the manifest is `{base_url}/components.json`.
    pub base_url: Option<String>,
    /// Request timeout in seconds. `0` disables the timeout.
    pub timeout_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RegistrySettings {
    /// The configured timeout, `None` when disabled.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// HTTP host bind address.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// One `[[site]]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteSettings {
    pub id: String,
    pub component: String,
    /// Kit capabilities bound under their own names.
    #[serde(default)]
    pub host: Vec<String>,
    /// Capability name -> id of the site whose output it receives.
    #[serde(default)]
    pub uses: BTreeMap<String, String>,
    /// Constant capabilities.
    #[serde(default)]
    pub constants: BTreeMap<String, serde_json::Value>,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, RemoraError> {
        toml::from_str(text).map_err(|e| RemoraError::Config(e.to_string()))
    }

    /// Load settings from `path`, or from `remora.toml` if present, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, RemoraError> {
        let mut settings = match path {
            Some(path) => Self::read(path)?,
            None if Path::new(CONFIG_FILE).is_file() => Self::read(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn read(path: &Path) -> Result<Self, RemoraError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RemoraError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&text)
    }

    /// Apply environment-style overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("REMORA_REGISTRY_URL").filter(|u| !u.trim().is_empty()) {
            self.registry.base_url = Some(url.trim().to_string());
        }
        if let Some(raw) = lookup("REMORA_HTTP_TIMEOUT_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.registry.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid REMORA_HTTP_TIMEOUT_SECS"),
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_toml_str("").expect("parse");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.registry.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(settings.registry.timeout(), None, "no timeout unless configured");
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn parses_sites() {
        let settings = Settings::from_toml_str(
            r#"
            [registry]
            base_url = "http://localhost:4000"

            [[site]]
            id = "toggle"
            component = "ModeToggle"
            host = ["Button", "Moon", "Sun"]

            [[site]]
            id = "navbar"
            component = "Navbar"
            uses = { ModeToggle = "toggle" }
            constants = { title = "Staff", count = 3 }
            "#,
        )
        .expect("parse");
        assert_eq!(
            settings.registry.base_url.as_deref(),
            Some("http://localhost:4000")
        );
        assert_eq!(settings.sites.len(), 2);
        assert_eq!(settings.sites[0].host, vec!["Button", "Moon", "Sun"]);
        assert_eq!(
            settings.sites[1].uses.get("ModeToggle").map(String::as_str),
            Some("toggle")
        );
        assert_eq!(
            settings.sites[1].constants.get("count"),
            Some(&serde_json::json!(3))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Settings::from_toml_str("[registry]\nurl = \"x\"").expect_err("unknown key");
        assert!(matches!(err, RemoraError::Config(_)));
    }

    #[test]
    fn overrides_win_over_file() {
        let mut settings =
            Settings::from_toml_str("[registry]\nbase_url = \"http://file\"").expect("parse");
        settings.apply_overrides(|key| match key {
            "REMORA_REGISTRY_URL" => Some("http://env/".to_string()),
            "REMORA_HTTP_TIMEOUT_SECS" => Some("3".to_string()),
            _ => None,
        });
        assert_eq!(settings.registry.base_url.as_deref(), Some("http://env/"));
        assert_eq!(settings.registry.timeout_secs, 3);
        assert_eq!(settings.registry.timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn invalid_timeout_is_ignored() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| {
            (key == "REMORA_HTTP_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert_eq!(settings.registry.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let settings = Settings::from_toml_str("[registry]\ntimeout_secs = 0").expect("parse");
        assert_eq!(settings.registry.timeout(), None);
    }

    #[test]
    fn configured_timeout_is_used() {
        let settings = Settings::from_toml_str("[registry]\ntimeout_secs = 10").expect("parse");
        assert_eq!(settings.registry.timeout(), Some(Duration::from_secs(10)));
    }
}
