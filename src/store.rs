//! Provider table plus the user's persisted choices.
//!
//! [`ConfigStore`] is the single place that knows which provider is selected
//! and which key and URL to use for it. It is built once per session and
//! handed to the chat session; every change is written straight back through
//! a [`StateStore`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{ChatError, Result};
use crate::profile::ProviderProfile;

/// What survives between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub selected_provider: Option<String>,
    /// Custom API keys by provider id.
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
    /// Endpoint overrides by provider id.
    #[serde(default)]
    pub api_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub use_default_key: bool,
    /// Providers whose credentials passed a validation probe.
    #[serde(default)]
    pub confirmed: BTreeSet<String>,
}

/// Key-value persistence for [`PersistedState`].
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<PersistedState>;
    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON file on disk.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<PersistedState> {
        if !self.path.exists() {
            return Ok(PersistedState::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ChatError::State(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| ChatError::State(format!("cannot parse {}: {}", self.path.display(), e)))
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChatError::State(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| ChatError::State(format!("cannot serialize state: {}", e)))?;
        std::fs::write(&self.path, json)
            .map_err(|e| ChatError::State(format!("cannot write {}: {}", self.path.display(), e)))
    }
}

/// Raw credential input from the user, saved before it is validated.
#[derive(Debug, Clone, Default)]
pub struct CredentialInput {
    /// `None` means "use the default key".
    pub custom_key: Option<String>,
    pub url_override: Option<String>,
}

pub struct ConfigStore {
    profiles: Vec<ProviderProfile>,
    state: PersistedState,
    default_keys: BTreeMap<String, String>,
    proxy_url: Option<String>,
    fallback_provider: String,
    backend: Box<dyn StateStore>,
}

impl ConfigStore {
    /// Build the store, reading persisted state. Unreadable state is logged
    /// and replaced by defaults.
    pub fn new(
        profiles: Vec<ProviderProfile>,
        default_keys: BTreeMap<String, String>,
        proxy_url: Option<String>,
        fallback_provider: impl Into<String>,
        backend: Box<dyn StateStore>,
    ) -> Self {
        let state = backend.load().unwrap_or_else(|e| {
            warn!(error = %e, "ignoring unreadable state, starting fresh");
            PersistedState::default()
        });
        Self {
            profiles,
            state,
            default_keys,
            proxy_url: proxy_url.filter(|u| !u.trim().is_empty()),
            fallback_provider: fallback_provider.into(),
            backend,
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let backend = FileStateStore::new(config.state_path()?);
        debug!(path = %backend.path().display(), "using state file");
        Ok(Self::new(
            config.profiles()?,
            config.default_keys.clone(),
            config.proxy.url.clone(),
            config.chat.default_provider.clone(),
            Box::new(backend),
        ))
    }

    pub fn list_providers(&self) -> &[ProviderProfile] {
        &self.profiles
    }

    pub fn profile(&self, id: &str) -> Result<&ProviderProfile> {
        self.profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ChatError::UnknownProvider(id.to_string()))
    }

    /// The selected profile. Falls back to the configured default, then to
    /// the first profile, so there is always exactly one.
    pub fn selected_profile(&self) -> &ProviderProfile {
        self.state
            .selected_provider
            .as_deref()
            .and_then(|id| self.profile(id).ok())
            .or_else(|| self.profile(&self.fallback_provider).ok())
            .unwrap_or(&self.profiles[0])
    }

    pub fn selected_id(&self) -> &str {
        &self.selected_profile().id
    }

    pub fn select_provider(&mut self, id: &str) -> Result<()> {
        self.profile(id)?;
        self.state.selected_provider = Some(id.to_string());
        self.persist()
    }

    pub fn set_custom_key(&mut self, id: &str, key: &str) -> Result<()> {
        self.profile(id)?;
        self.state.api_keys.insert(id.to_string(), key.trim().to_string());
        self.persist()
    }

    /// An empty URL clears the override.
    pub fn set_url_override(&mut self, id: &str, url: &str) -> Result<()> {
        self.profile(id)?;
        let url = url.trim();
        if url.is_empty() {
            self.state.api_urls.remove(id);
        } else {
            self.state.api_urls.insert(id.to_string(), url.to_string());
        }
        self.persist()
    }

    pub fn set_use_default_key(&mut self, flag: bool) -> Result<()> {
        self.state.use_default_key = flag;
        self.persist()
    }

    pub fn use_default_key(&self) -> bool {
        self.state.use_default_key
    }

    /// Save the raw key/URL/flag the user typed, before any validation.
    /// The provider stays unconfirmed until a probe succeeds again.
    ///
    /// A blank custom key is refused before anything is written, unless the
    /// provider goes through the proxy.
    pub fn store_credentials(&mut self, id: &str, input: &CredentialInput) -> Result<()> {
        let profile = self.profile(id)?;
        let proxied = profile.use_proxy && self.proxy_url.is_some();
        if !proxied && input.custom_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(ChatError::Auth {
                provider: id.to_string(),
                reason: "API key is empty".to_string(),
            });
        }

        self.state.confirmed.remove(id);
        self.set_url_override(id, input.url_override.as_deref().unwrap_or(""))?;
        match &input.custom_key {
            Some(key) => {
                self.set_custom_key(id, key)?;
                self.set_use_default_key(false)
            }
            None => self.set_use_default_key(true),
        }
    }

    pub fn mark_confirmed(&mut self, id: &str) -> Result<()> {
        self.state.confirmed.insert(id.to_string());
        self.persist()
    }

    pub fn is_confirmed(&self, id: &str) -> bool {
        self.state.confirmed.contains(id)
    }

    /// Operator-injected key, else the profile's built-in key.
    pub fn default_key(&self, id: &str) -> Option<&str> {
        let injected = self
            .default_keys
            .get(id)
            .map(String::as_str)
            .filter(|k| !k.is_empty());
        injected.or_else(|| {
            self.profile(id)
                .ok()
                .and_then(|p| p.default_api_key.as_deref())
                .filter(|k| !k.is_empty())
        })
    }

    /// The key to use for `id`: the default key when that mode is on and one
    /// exists, otherwise the stored custom key (possibly empty).
    pub fn resolve_api_key(&self, id: &str) -> Result<String> {
        self.profile(id)?;
        if self.state.use_default_key {
            if let Some(key) = self.default_key(id) {
                return Ok(key.to_string());
            }
        }
        Ok(self.state.api_keys.get(id).cloned().unwrap_or_default())
    }

    /// The override when non-empty, else the profile endpoint.
    pub fn resolve_api_url(&self, id: &str) -> Result<String> {
        let profile = self.profile(id)?;
        Ok(self
            .state
            .api_urls
            .get(id)
            .filter(|u| !u.is_empty())
            .cloned()
            .unwrap_or_else(|| profile.endpoint_url.clone()))
    }

    pub fn current_api_key(&self) -> String {
        self.resolve_api_key(self.selected_id()).unwrap_or_default()
    }

    pub fn current_api_url(&self) -> String {
        let profile = self.selected_profile();
        self.resolve_api_url(&profile.id)
            .unwrap_or_else(|_| profile.endpoint_url.clone())
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    fn persist(&self) -> Result<()> {
        self.backend.save(&self.state)
    }

    /// Whether a request for the selected provider could be authenticated:
    /// either it goes through the proxy or a non-empty key resolves.
    pub fn has_usable_key(&self) -> bool {
        let profile = self.selected_profile();
        (profile.use_proxy && self.proxy_url.is_some()) || !self.current_api_key().is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::memory::{store_with, MemoryStateStore};
    use super::*;
    use crate::profile::builtin_profiles;

    #[test]
    fn test_defaults_select_fallback_provider() {
        let (store, _) = store_with(builtin_profiles());
        assert_eq!(store.selected_id(), "qwen");
        assert!(!store.use_default_key());
        assert_eq!(store.current_api_key(), "");
        assert_eq!(store.current_api_url(), store.profile("qwen").unwrap().endpoint_url);
    }

    #[test]
    fn test_unknown_persisted_selection_falls_back() {
        let backend = MemoryStateStore::default();
        backend.inner.lock().unwrap().selected_provider = Some("gone".to_string());
        let store = ConfigStore::new(
            builtin_profiles(),
            BTreeMap::new(),
            None,
            "claude",
            Box::new(backend),
        );
        assert_eq!(store.selected_id(), "claude");
    }

    #[test]
    fn test_select_unknown_provider_fails() {
        let (mut store, _) = store_with(builtin_profiles());
        let err = store.select_provider("nope").unwrap_err();
        assert!(matches!(err, ChatError::UnknownProvider(_)));
        assert_eq!(store.selected_id(), "qwen");
    }

    #[test]
    fn test_changes_are_persisted() {
        let (mut store, backend) = store_with(builtin_profiles());
        store.select_provider("kimi").unwrap();
        store.set_custom_key("kimi", " sk-kimi ").unwrap();
        store.set_url_override("kimi", "https://kimi.proxy/v1").unwrap();
        store.set_use_default_key(true).unwrap();

        let saved = backend.inner.lock().unwrap().clone();
        assert_eq!(saved.selected_provider.as_deref(), Some("kimi"));
        assert_eq!(saved.api_keys.get("kimi").map(String::as_str), Some("sk-kimi"));
        assert_eq!(
            saved.api_urls.get("kimi").map(String::as_str),
            Some("https://kimi.proxy/v1")
        );
        assert!(saved.use_default_key);

        // A second store over the same backend sees the same state.
        let reopened = ConfigStore::new(
            builtin_profiles(),
            BTreeMap::new(),
            None,
            "qwen",
            Box::new(backend),
        );
        assert_eq!(reopened.selected_id(), "kimi");
        assert_eq!(reopened.current_api_url(), "https://kimi.proxy/v1");
    }

    #[test]
    fn test_empty_url_override_clears() {
        let (mut store, _) = store_with(builtin_profiles());
        store.set_url_override("openai", "http://x").unwrap();
        store.set_url_override("openai", "  ").unwrap();
        assert_eq!(
            store.resolve_api_url("openai").unwrap(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_default_key_resolution() {
        let mut profiles = builtin_profiles();
        profiles[0].default_api_key = Some("sk-builtin".to_string());
        let (mut store, _) = store_with(profiles);

        store.set_use_default_key(true).unwrap();
        assert_eq!(store.current_api_key(), "sk-builtin");

        store.set_use_default_key(false).unwrap();
        store.set_custom_key("qwen", "abc").unwrap();
        assert_eq!(store.current_api_key(), "abc");
    }

    #[test]
    fn test_injected_key_beats_profile_key() {
        let mut profiles = builtin_profiles();
        profiles[0].default_api_key = Some("sk-builtin".to_string());
        let keys = BTreeMap::from([("qwen".to_string(), "sk-operator".to_string())]);
        let mut store = ConfigStore::new(
            profiles,
            keys,
            None,
            "qwen",
            Box::new(MemoryStateStore::default()),
        );
        store.set_use_default_key(true).unwrap();
        assert_eq!(store.current_api_key(), "sk-operator");
    }

    #[test]
    fn test_default_mode_without_default_key_uses_custom() {
        let (mut store, _) = store_with(builtin_profiles());
        store.set_custom_key("qwen", "mine").unwrap();
        store.set_use_default_key(true).unwrap();
        assert_eq!(store.current_api_key(), "mine");
    }

    #[test]
    fn test_store_credentials() {
        let (mut store, _) = store_with(builtin_profiles());
        store
            .store_credentials(
                "deepseek",
                &CredentialInput {
                    custom_key: Some("ds-key".to_string()),
                    url_override: Some("http://ds".to_string()),
                },
            )
            .unwrap();
        assert!(!store.use_default_key());
        assert_eq!(store.resolve_api_key("deepseek").unwrap(), "ds-key");
        assert_eq!(store.resolve_api_url("deepseek").unwrap(), "http://ds");

        store
            .store_credentials("deepseek", &CredentialInput::default())
            .unwrap();
        assert!(store.use_default_key());
        assert_eq!(
            store.resolve_api_url("deepseek").unwrap(),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_blank_custom_key_keeps_previous_credentials() {
        let (mut store, backend) = store_with(builtin_profiles());
        store.set_custom_key("kimi", "sk-working").unwrap();
        store.mark_confirmed("kimi").unwrap();

        let err = store
            .store_credentials(
                "kimi",
                &CredentialInput {
                    custom_key: Some("   ".to_string()),
                    url_override: Some("http://elsewhere".to_string()),
                },
            )
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(store.resolve_api_key("kimi").unwrap(), "sk-working");
        assert_eq!(
            store.resolve_api_url("kimi").unwrap(),
            store.profile("kimi").unwrap().endpoint_url
        );
        assert!(store.is_confirmed("kimi"));
        assert_eq!(
            backend.inner.lock().unwrap().api_keys.get("kimi").map(String::as_str),
            Some("sk-working")
        );
    }

    #[test]
    fn test_blank_custom_key_allowed_through_proxy() {
        let mut profiles = builtin_profiles();
        profiles[0].use_proxy = true;
        let id = profiles[0].id.clone();
        let mut store = ConfigStore::new(
            profiles,
            BTreeMap::new(),
            Some("https://proxy".to_string()),
            "qwen",
            Box::new(MemoryStateStore::default()),
        );
        store
            .store_credentials(
                &id,
                &CredentialInput {
                    custom_key: Some(String::new()),
                    url_override: None,
                },
            )
            .unwrap();
        assert_eq!(store.resolve_api_key(&id).unwrap(), "");
    }

    #[test]
    fn test_file_store_round_trip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let file = FileStateStore::new(&path);
        assert_eq!(file.load().unwrap(), PersistedState::default());

        let mut state = PersistedState::default();
        state.selected_provider = Some("claude".to_string());
        state.confirmed.insert("claude".to_string());
        file.save(&state).unwrap();
        assert_eq!(file.load().unwrap(), state);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(file.load(), Err(ChatError::State(_))));

        let store = ConfigStore::new(
            builtin_profiles(),
            BTreeMap::new(),
            None,
            "qwen",
            Box::new(FileStateStore::new(&path)),
        );
        assert_eq!(store.selected_id(), "qwen");
    }

    #[test]
    fn test_proxy_backed_profile_needs_no_key() {
        let mut profiles = builtin_profiles();
        profiles[0].use_proxy = true;
        let store = ConfigStore::new(
            profiles,
            BTreeMap::new(),
            Some("https://proxy".to_string()),
            "qwen",
            Box::new(MemoryStateStore::default()),
        );
        assert!(store.has_usable_key());
    }
}
