use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NotegateConfig {
    pub server: ServerConfig,
    pub vault: VaultConfig,
    pub approval: ApprovalConfig,
    pub audit: AuditConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub log_level: String,
    pub max_body_bytes: usize,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    /// Origins allowed in addition to the loopback ones, e.g. the host app's scheme.
    pub extra_origins: Vec<String>,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VaultConfig {
    pub root: String,
    /// Non-secret store identifier reported by `/health`. Empty means the root's directory name.
    pub name: String,
    pub allowed_extensions: Vec<String>,
    pub default_extension: String,
    pub task_note: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApprovalConfig {
    pub require_approval: bool,
    pub timeout_secs: u64,
    /// `"console"` prompts on the server's terminal, `"deny"` rejects everything.
    pub consent: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub capacity: usize,
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Resolved path of the search executable. Empty means search is unavailable.
    pub executable: String,
    pub search_timeout_secs: u64,
    pub index_timeout_secs: u64,
    pub default_limit: usize,
    pub index_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 22360,
            log_level: "info".into(),
            max_body_bytes: 10 * 1024 * 1024,
            rate_limit_requests: 100,
            rate_limit_window_secs: 60,
            extra_origins: vec!["app://obsidian.md".into()],
            shutdown_grace_secs: 5,
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: "~/Notes".into(),
            name: String::new(),
            allowed_extensions: vec!["md".into()],
            default_extension: "md".into(),
            task_note: "Tasks.md".into(),
        }
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            require_approval: true,
            timeout_secs: 30,
            consent: "console".into(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1000,
            debug: false,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            executable: String::new(),
            search_timeout_secs: 30,
            index_timeout_secs: 300,
            default_limit: 10,
            index_on_start: false,
        }
    }
}

impl ServerConfig {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl ApprovalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SearchConfig {
    /// The configured executable, if any. No filesystem probing happens here.
    pub fn resolved_executable(&self) -> Option<PathBuf> {
        if self.executable.trim().is_empty() {
            None
        } else {
            Some(expand_tilde(self.executable.trim()))
        }
    }
}

/// Returns `~/.notegate/`
pub fn default_notegate_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".notegate")
}

/// Returns the default config file path: `~/.notegate/config.toml`
pub fn default_config_path() -> PathBuf {
    default_notegate_dir().join("config.toml")
}

impl NotegateConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            NotegateConfig::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (NOTEGATE_VAULT, NOTEGATE_PORT, NOTEGATE_LOG_LEVEL, NOTEGATE_SEARCH_BIN).
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("NOTEGATE_VAULT") {
            self.vault.root = val;
        }
        if let Ok(val) = std::env::var("NOTEGATE_PORT") {
            self.server.port = val
                .parse()
                .with_context(|| format!("NOTEGATE_PORT is not a valid port: {val}"))?;
        }
        if let Ok(val) = std::env::var("NOTEGATE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("NOTEGATE_SEARCH_BIN") {
            self.search.executable = val;
        }
        Ok(())
    }

    /// Resolve the vault root, expanding `~` if needed.
    pub fn resolved_vault_root(&self) -> PathBuf {
        expand_tilde(&self.vault.root)
    }

    /// The store name reported by the health route.
    pub fn store_name(&self) -> String {
        if !self.vault.name.is_empty() {
            return self.vault.name.clone();
        }
        self.resolved_vault_root()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vault".into())
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = NotegateConfig::default();
        assert_eq!(config.server.port, 22360);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.server.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.server.rate_limit_requests, 100);
        assert_eq!(config.approval.timeout_secs, 30);
        assert!(config.approval.require_approval);
        assert_eq!(config.audit.capacity, 1000);
        assert!(config.search.resolved_executable().is_none());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
port = 9000

[vault]
root = "/tmp/vault"
name = "work"

[approval]
consent = "deny"
"#;
        let config: NotegateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.vault.root, "/tmp/vault");
        assert_eq!(config.store_name(), "work");
        assert_eq!(config.approval.consent, "deny");
        // defaults still apply for unset fields
        assert_eq!(config.approval.timeout_secs, 30);
        assert_eq!(config.vault.default_extension, "md");
    }

    #[test]
    fn store_name_falls_back_to_root_dir() {
        let mut config = NotegateConfig::default();
        config.vault.root = "/srv/notes/research".into();
        assert_eq!(config.store_name(), "research");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = NotegateConfig::default();
        std::env::set_var("NOTEGATE_VAULT", "/tmp/override-vault");
        std::env::set_var("NOTEGATE_PORT", "4242");
        std::env::set_var("NOTEGATE_LOG_LEVEL", "trace");
        std::env::set_var("NOTEGATE_SEARCH_BIN", "/usr/local/bin/qmd");

        config.apply_env_overrides().unwrap();

        assert_eq!(config.vault.root, "/tmp/override-vault");
        assert_eq!(config.server.port, 4242);
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(
            config.search.resolved_executable(),
            Some(PathBuf::from("/usr/local/bin/qmd"))
        );

        // Clean up
        std::env::remove_var("NOTEGATE_VAULT");
        std::env::remove_var("NOTEGATE_PORT");
        std::env::remove_var("NOTEGATE_LOG_LEVEL");
        std::env::remove_var("NOTEGATE_SEARCH_BIN");
    }
}
