use crate::error::{DnsError, Result};
use crate::probe::DEFAULT_TIMEOUT;
use crate::registry::Registry;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_MS: u64 = DEFAULT_TIMEOUT.as_millis() as u64;

// Global cache for the parsed user settings
static SETTINGS_CACHE: OnceLock<Settings> = OnceLock::new();

/// 用户自定义的 DNS 服务器，省略 name 时使用 `Custom-<address>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub address: String,
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timeout_ms: u64,
    pub servers: Vec<CustomServer>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            servers: Vec::new(),
        }
    }
}

/// ~/.config/dnspick/config.toml (或各平台对应目录)
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "dnspick").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Retrieve the user settings
/// Strategy:
/// 1. Try to load from User Config (config_path())
/// 2. Fallback to built-in defaults
pub fn settings() -> &'static Settings {
    SETTINGS_CACHE.get_or_init(|| {
        if let Some(path) = config_path() {
            if path.exists() {
                match Settings::load_from(&path) {
                    Ok(settings) => {
                        debug!(?path, "loaded settings");
                        return settings;
                    }
                    Err(e) => warn!(?path, error = %e, "ignoring unreadable settings file"),
                }
            }
        }
        Settings::default()
    })
}

impl Settings {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Same trim/non-empty rule as `Registry::add`. Re-adding an address is a no-op.
    pub fn add_server(&mut self, address: &str) -> Result<CustomServer> {
        let address = address.trim();
        if address.is_empty() {
            return Err(DnsError::InvalidInput(
                "DNS server address must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.servers.iter().find(|s| s.address == address) {
            return Ok(existing.clone());
        }

        let server = CustomServer {
            name: None,
            address: address.to_string(),
        };
        self.servers.push(server.clone());
        Ok(server)
    }

    /// CLI 参数优先于配置文件；0 视为非法配置
    pub fn timeout(&self, override_ms: Option<u64>) -> Result<Duration> {
        let ms = override_ms.unwrap_or(self.timeout_ms);
        if ms == 0 {
            return Err(DnsError::InvalidInput(
                "timeout must be greater than 0 ms".to_string(),
            ));
        }
        Ok(Duration::from_millis(ms))
    }

    /// Built-in defaults followed by the configured custom servers.
    pub fn build_registry(&self) -> Registry {
        let registry = Registry::new();
        for server in &self.servers {
            let res = match &server.name {
                Some(name) => registry.insert(name, &server.address),
                None => registry.add(&server.address),
            };
            if let Err(e) = res {
                warn!(error = %e, "skipping configured server");
            }
        }
        registry
    }
}
