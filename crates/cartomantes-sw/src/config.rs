//! Worker configuration.
//!
//! The cache version is injected here at startup (build or deploy time) instead of
//! living in a global constant, so a cache generation is a parameter of the worker.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::{Origin, Url};

use crate::error::ConfigError;

/// Environment variable that overrides [`WorkerConfig::version`].
pub const VERSION_ENV: &str = "CARTOMANTES_SW_VERSION";

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Cache version; the current generation is `cache_prefix + version`.
    pub version: String,

    /// Registration scope. Relative URLs are resolved against it.
    pub scope: Url,

    /// Application name, also the default notification title.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Prefix shared by every cache generation of this app.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Scope-relative paths precached on install.
    #[serde(default = "default_app_shell")]
    pub app_shell: Vec<String>,

    /// Cached HTML served when a navigation fails and the page itself is not cached.
    #[serde(default = "default_fallback_page")]
    pub fallback_page: String,

    /// Canonical page opened by notifications that carry no URL.
    #[serde(default = "default_landing_page")]
    pub landing_page: String,

    /// Notification body used when a payload carries none.
    #[serde(default = "default_body")]
    pub default_body: String,

    /// Notification icon, scope-relative.
    #[serde(default = "default_icon")]
    pub icon: String,

    /// Notification badge, scope-relative.
    #[serde(default = "default_icon")]
    pub badge: String,

    /// Post `SW_UPDATED` to every client after activation.
    #[serde(default = "default_true")]
    pub broadcast_updates: bool,

    /// Handle background messages from the cloud messaging subsystem.
    #[serde(default = "default_true")]
    pub messaging_enabled: bool,

    /// Ignore the query string when looking up a failed navigation in the cache.
    #[serde(default)]
    pub html_ignore_search: bool,

    /// Push-registration endpoint posted to when the subscription changes.
    #[serde(default)]
    pub resubscribe_endpoint: Option<Url>,

    /// User agent reported to the push-registration endpoint.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_app_name() -> String {
    "Cartomantes Online".to_string()
}

fn default_cache_prefix() -> String {
    "cartomantes-cache-".to_string()
}

fn default_app_shell() -> Vec<String> {
    [
        "./",
        "./index.html",
        "./leituras.html",
        "./manifest.json",
        "./logo.png",
        "./service-worker.js",
        "./notificacoes.html",
        "./painel.html",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_fallback_page() -> String {
    "./leituras.html".to_string()
}

fn default_landing_page() -> String {
    "leituras.html?pwa=true".to_string()
}

fn default_body() -> String {
    "Você tem uma nova atualização.".to_string()
}

fn default_icon() -> String {
    "./logo.png".to_string()
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("cartomantes-sw/{}", env!("CARGO_PKG_VERSION"))
}

impl WorkerConfig {
    /// Create a configuration with default settings for `version` at `scope`.
    pub fn new(version: impl Into<String>, scope: Url) -> Self {
        Self {
            version: version.into(),
            scope,
            app_name: default_app_name(),
            cache_prefix: default_cache_prefix(),
            app_shell: default_app_shell(),
            fallback_page: default_fallback_page(),
            landing_page: default_landing_page(),
            default_body: default_body(),
            icon: default_icon(),
            badge: default_icon(),
            broadcast_updates: true,
            messaging_enabled: true,
            html_ignore_search: false,
            resubscribe_endpoint: None,
            user_agent: default_user_agent(),
        }
    }

    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file, apply environment overrides, and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&contents)?;
        config.apply_env();
        config.validate()?;
        debug!(path = %path.display(), version = %config.version, "Loaded worker config");
        Ok(config)
    }

    /// Apply `CARTOMANTES_SW_VERSION` if set.
    pub fn apply_env(&mut self) {
        if let Ok(version) = std::env::var(VERSION_ENV) {
            if !version.trim().is_empty() {
                self.version = version.trim().to_string();
            }
        }
    }

    /// Check invariants the handlers rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("version must not be empty".to_string()));
        }
        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid("cache_prefix must not be empty".to_string()));
        }
        if !matches!(self.scope.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "scope must be an http(s) URL, got {}",
                self.scope
            )));
        }
        self.scope.join(&self.landing_page)?;
        self.scope.join(&self.fallback_page)?;
        Ok(())
    }

    /// Name of the current cache generation.
    pub fn cache_name(&self) -> String {
        format!("{}{}", self.cache_prefix, self.version)
    }

    /// Whether `name` is a generation of this app.
    pub fn owns_cache(&self, name: &str) -> bool {
        name.starts_with(&self.cache_prefix)
    }

    /// Origin of the worker.
    pub fn origin(&self) -> Origin {
        self.scope.origin()
    }

    /// Whether `url` shares the worker's origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.scope.origin()
    }

    /// Absolute URL of the landing page.
    pub fn landing_url(&self) -> Url {
        // validate() guarantees the join succeeds
        self.scope.join(&self.landing_page).unwrap_or_else(|_| self.scope.clone())
    }

    /// Resolve `raw` against the scope; unparsable input falls back to the landing page.
    pub fn resolve(&self, raw: &str) -> Url {
        match self.scope.join(raw) {
            Ok(url) => url,
            Err(error) => {
                debug!(raw, %error, "Unresolvable URL, using landing page");
                self.landing_url()
            }
        }
    }
}
