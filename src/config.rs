//! Configuration management for promptlab.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::profile::{builtin_profiles, ProfileDef, ProviderProfile, DEFAULT_PROVIDER_ID};
use crate::templates::PromptTemplate;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Operator-provided keys used when "use default key" is on.
    #[serde(default)]
    pub default_keys: BTreeMap<String, String>,
    /// Extra provider profiles; an entry with a built-in id replaces it.
    #[serde(default)]
    pub providers: Vec<ProfileDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Provider selected when the state file has none.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default)]
    pub template: PromptTemplate,
    /// Where selection and keys are persisted. Defaults to `~/.promptlab/state.json`.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Longest silence tolerated while waiting for headers or the next chunk.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER_ID.to_string()
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_read_timeout() -> u64 {
    60
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            template: PromptTemplate::default(),
            state_path: None,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Key-injecting proxy used by profiles with `use_proxy = true`.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".promptlab"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load `~/.promptlab/config.toml` (or defaults) and apply env overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;

        if let Ok(provider) = std::env::var("PROMPTLAB_PROVIDER") {
            config.chat.default_provider = provider;
        }
        if let Ok(template) = std::env::var("PROMPTLAB_TEMPLATE") {
            config.chat.template = PromptTemplate::from_name(&template)
                .with_context(|| format!("Unknown template in PROMPTLAB_TEMPLATE: '{}'", template))?;
        }
        if let Ok(proxy) = std::env::var("PROMPTLAB_PROXY_URL") {
            config.proxy.url = Some(proxy);
        }

        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save_default() -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        Self::default().save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.chat.state_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("state.json")),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.read_timeout_secs)
    }

    /// Built-in profiles merged with the ones declared in the config file.
    pub fn profiles(&self) -> Result<Vec<ProviderProfile>> {
        let mut profiles = builtin_profiles();
        for def in &self.providers {
            let id = def.id.clone();
            let profile = ProviderProfile::try_from(def.clone())
                .with_context(|| format!("Invalid provider '{}' in config", id))?;
            match profiles.iter_mut().find(|p| p.id == profile.id) {
                Some(existing) => *existing = profile,
                None => profiles.push(profile),
            }
        }
        Ok(profiles)
    }
}
