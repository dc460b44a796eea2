//! Runtime configuration — where the store lives, where templates are
//! autoloaded from, and which host/port the edge binds to.
//!
//! RULE: this module only reads environment variables and the filesystem.
//! It never talks to the store directly — callers pass the resolved
//! `EngineConfig` into `SimStore::open` / the rule importer themselves.

use std::env;

/// Resolved engine configuration, assembled from environment variables
/// with sane defaults for local development.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the SQLite store file, or `:memory:`.
    pub store_path: String,
    /// Directory scanned for `*.csv` rule templates on startup when
    /// `autoload_templates` is set.
    pub template_dir: String,
    /// Host the HTTP edge binds to.
    pub host: String,
    /// Port the HTTP edge binds to.
    pub port: u16,
    /// Whether to import every CSV under `template_dir` on startup.
    pub autoload_templates: bool,
}

impl EngineConfig {
    /// Read configuration from the environment, falling back to
    /// development defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            store_path: env::var("IMPACTSIM_STORE_PATH").unwrap_or_else(|_| "./impactsim.db".into()),
            template_dir: env::var("IMPACTSIM_TEMPLATE_DIR").unwrap_or_else(|_| "./templates".into()),
            host: env::var("IMPACTSIM_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("IMPACTSIM_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            autoload_templates: env::var("IMPACTSIM_AUTOLOAD_TEMPLATES")
                .map(|v| parse_bool(&v).unwrap_or(false))
                .unwrap_or(false),
        }
    }

    /// Configuration with in-memory store, used by tests and the
    /// headless tooling's quick-start mode.
    pub fn default_test() -> Self {
        Self {
            store_path: ":memory:".into(),
            template_dir: "./templates".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            autoload_templates: false,
        }
    }
}

/// Parse the boolean forms accepted by the CSV rule-import format (§6):
/// `0/1, true/false, yes/no, on/off`, case-insensitive.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_documented_boolean_spellings() {
        for truthy in ["1", "true", "TRUE", "yes", "Yes", "on"] {
            assert_eq!(parse_bool(truthy), Some(true), "{truthy}");
        }
        for falsy in ["0", "false", "FALSE", "no", "No", "off"] {
            assert_eq!(parse_bool(falsy), Some(false), "{falsy}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn default_test_config_uses_in_memory_store() {
        let cfg = EngineConfig::default_test();
        assert_eq!(cfg.store_path, ":memory:");
    }
}
