use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Store config ──────────────────────────────────────────────────────────────

/// Connection settings for the remote document store.
///
/// The bearer token is the only secret; it can live in the config file or in
/// the `CAPSULE_STORE_TOKEN` environment variable (env takes precedence).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub token: String,
    /// Base URL of the store's REST API, without a trailing slash.
    pub base_url: String,
    /// Title of the document that holds the journal entries.  Every lookup,
    /// classification and aggregate operation is scoped to this document.
    pub root_title: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: "https://connect.craft.do/api/v1".to_string(),
            root_title: "Journals".to_string(),
        }
    }
}

// ── Analyzer config ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// API key for the analysis provider.  Can also be set via the
    /// `OPENAI_API_KEY` environment variable (env takes precedence).
    pub api_key: String,
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub base_url: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

// ── Runner config ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Delay in milliseconds inserted after each successfully processed entry
    /// during a batch run.  The only backpressure mechanism; there is no
    /// adaptive retry or backoff.
    pub pace_ms: u64,
    /// How deep to fetch an entry subtree before text extraction.  Journals
    /// with heavily nested bullets may need more than the default.
    pub entry_fetch_depth: i32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pace_ms: 500,
            entry_fetch_depth: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub analyzer: AnalyzerConfig,
    pub runner: RunnerConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(token) = env::var("CAPSULE_STORE_TOKEN") {
            if !token.is_empty() {
                config.store.token = token;
            }
        }

        // Analyzer key env override (takes precedence over config file).
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.analyzer.api_key = key;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn has_store_token(&self) -> bool {
        !self.store.token.trim().is_empty()
    }

    pub fn has_analyzer_key(&self) -> bool {
        !self.analyzer.api_key.trim().is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert!(cfg.store.token.is_empty());
        assert_eq!(cfg.store.root_title, "Journals");
        assert_eq!(cfg.analyzer.model, "gpt-4o");
        assert_eq!(cfg.analyzer.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.runner.pace_ms, 500);
        assert_eq!(cfg.runner.entry_fetch_depth, 5);
        assert_eq!(cfg.telemetry.log_level, "info");
        assert!(!cfg.has_store_token());
        assert!(!cfg.has_analyzer_key());
    }

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load_from(dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(cfg.store.root_title, "Journals");
        assert_eq!(cfg.runner.pace_ms, 500);
    }

    #[test]
    fn load_from_valid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.toml");
        fs::write(
            &path,
            r#"
[store]
token = "tkn-123"
base_url = "https://store.example/api/v1"
root_title = "Diary"

[analyzer]
api_key = "sk-test"
model = "gpt-4o-mini"

[runner]
pace_ms = 1200
entry_fetch_depth = 3
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.store.token, "tkn-123");
        assert_eq!(cfg.store.base_url, "https://store.example/api/v1");
        assert_eq!(cfg.store.root_title, "Diary");
        assert_eq!(cfg.analyzer.api_key, "sk-test");
        assert_eq!(cfg.analyzer.model, "gpt-4o-mini");
        assert_eq!(cfg.runner.pace_ms, 1200);
        assert_eq!(cfg.runner.entry_fetch_depth, 3);
        // Unspecified sections should have defaults
        assert_eq!(cfg.telemetry.log_level, "info");
        assert!(cfg.has_store_token());
        assert!(cfg.has_analyzer_key());
    }

    #[test]
    fn load_from_partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            r#"
[store]
root_title = "Morning Pages"
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.store.root_title, "Morning Pages");
        // Everything else should be default
        assert_eq!(cfg.analyzer.model, "gpt-4o");
        assert_eq!(cfg.runner.pace_ms, 500);
    }

    #[test]
    fn load_from_invalid_toml_returns_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub/config.toml");

        let mut cfg = AppConfig::default();
        cfg.store.token = "round-trip".to_string();
        cfg.store.root_title = "Journals 2024".to_string();
        cfg.analyzer.model = "gpt-4.1-mini".to_string();
        cfg.runner.pace_ms = 250;

        cfg.save_to(&path).unwrap();
        assert!(path.exists());

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.store.token, "round-trip");
        assert_eq!(loaded.store.root_title, "Journals 2024");
        assert_eq!(loaded.analyzer.model, "gpt-4.1-mini");
        assert_eq!(loaded.runner.pace_ms, 250);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/config.toml");
        let cfg = AppConfig::default();
        cfg.save_to(&path).unwrap();
        assert!(path.exists());
    }

    // ── Env var overrides ──────────────────────────────────────────────────

    #[test]
    fn env_store_token_overrides_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.toml");
        fs::write(
            &path,
            r#"
[store]
token = "from-file"
"#,
        )
        .unwrap();

        // SAFETY: test is single-threaded for this env var.
        unsafe { env::set_var("CAPSULE_STORE_TOKEN", "from-env") };
        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.store.token, "from-env");
        unsafe { env::remove_var("CAPSULE_STORE_TOKEN") };
    }

    #[test]
    fn env_analyzer_key_overrides_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("key.toml");
        fs::write(
            &path,
            r#"
[analyzer]
api_key = "from-file"
"#,
        )
        .unwrap();

        // SAFETY: test is single-threaded for this env var.
        unsafe { env::set_var("OPENAI_API_KEY", "from-env") };
        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.analyzer.api_key, "from-env");
        unsafe { env::remove_var("OPENAI_API_KEY") };
    }
}
