//! apichat configuration loader.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, environment variables,
//! command-line flags (applied by the caller).

use ac_llm::{ChatSettings, Provider, VisionSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub keys: KeysConfig,
    pub anthropic: ProviderConfig,
    pub openai: ProviderConfig,
    pub vision: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_system_prompt() -> String {
    ac_llm::DEFAULT_SYSTEM_INSTRUCTION.to_string()
}

#[derive(Clone, Default, Deserialize)]
pub struct KeysConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl std::fmt::Debug for KeysConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("KeysConfig")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .finish()
    }
}

/// Model, endpoint and limits for one request family. Missing fields take the family's
/// defaults, so a partial table in the file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub model: String,
    pub max_tokens: u32,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    fn from_chat(s: ChatSettings) -> Self {
        Self {
            model: s.model,
            max_tokens: s.max_tokens,
            endpoint: s.endpoint,
            timeout_secs: s.timeout.as_secs(),
        }
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn vision_settings(&self) -> VisionSettings {
        VisionSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    fn validate(&self, section: &str) -> anyhow::Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow::anyhow!("{section}.model is required"));
        }
        if self.max_tokens == 0 {
            return Err(anyhow::anyhow!("{section}.max_tokens must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow::anyhow!("{section}.timeout_secs must be > 0"));
        }
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(anyhow::anyhow!(
                "{section}.endpoint must be an http(s) url, got {endpoint:?}"
            ));
        }
        Ok(())
    }
}

fn default_anthropic() -> ProviderConfig {
    ProviderConfig::from_chat(Provider::Anthropic.default_settings())
}

fn default_openai() -> ProviderConfig {
    ProviderConfig::from_chat(Provider::OpenAI.default_settings())
}

fn default_vision() -> ProviderConfig {
    let v = VisionSettings::default();
    ProviderConfig {
        model: v.model,
        max_tokens: v.max_tokens,
        endpoint: v.endpoint,
        timeout_secs: v.timeout.as_secs(),
    }
}

/// Partial table as written in the file.
#[derive(Debug, Default, Deserialize)]
struct ProviderFile {
    model: Option<String>,
    max_tokens: Option<u32>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

impl ProviderFile {
    fn merge_into(self, base: ProviderConfig) -> ProviderConfig {
        ProviderConfig {
            model: self.model.unwrap_or(base.model),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            endpoint: self.endpoint.unwrap_or(base.endpoint),
            timeout_secs: self.timeout_secs.unwrap_or(base.timeout_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    general: GeneralConfig,
    #[serde(default)]
    keys: KeysConfig,
    #[serde(default)]
    anthropic: ProviderFile,
    #[serde(default)]
    openai: ProviderFile,
    #[serde(default)]
    vision: ProviderFile,
}

impl AppConfig {
    pub fn defaults() -> Self {
        Self {
            general: GeneralConfig::default(),
            keys: KeysConfig::default(),
            anthropic: default_anthropic(),
            openai: default_openai(),
            vision: default_vision(),
        }
    }

    /// Loads `path`, or the default location if it exists. An explicit path that is missing
    /// is an error; a missing default file just means built-in defaults.
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(default_config_path);

        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::parse(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Self::defaults()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        Ok(Self {
            general: file.general,
            keys: file.keys,
            anthropic: file.anthropic.merge_into(default_anthropic()),
            openai: file.openai.merge_into(default_openai()),
            vision: file.vision.merge_into(default_vision()),
        })
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(Provider::OpenAI.api_key_env()) {
            self.keys.openai_api_key = Some(v);
        }
        if let Some(v) = get(Provider::Anthropic.api_key_env()) {
            self.keys.anthropic_api_key = Some(v);
        }
        if let Some(v) = get("APICHAT_ANTHROPIC_MODEL") {
            self.anthropic.model = v;
        }
        if let Some(v) = get("APICHAT_OPENAI_MODEL") {
            self.openai.model = v;
        }
        // OpenAI-compatible proxies serve both chat and vision.
        if let Some(v) = get("APICHAT_OPENAI_ENDPOINT") {
            self.openai.endpoint = v.clone();
            self.vision.endpoint = v;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.anthropic.validate("anthropic")?;
        self.openai.validate("openai")?;
        self.vision.validate("vision")?;
        Ok(())
    }

    pub fn provider(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Anthropic => &self.anthropic,
            Provider::OpenAI => &self.openai,
        }
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::Anthropic => self.keys.anthropic_api_key.as_deref(),
            Provider::OpenAI => self.keys.openai_api_key.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }

    /// Returns the key or a configuration error carrying the remediation hint.
    pub fn require_api_key(&self, provider: Provider) -> ac_llm::Result<&str> {
        self.api_key(provider).ok_or_else(|| {
            let var = provider.api_key_env();
            ac_llm::LlmError::Configuration(format!(
                "{var} not found in environment variables.\n\
                 Please create a .env file with your API key:\n\
                 {var}=your-api-key-here"
            ))
        })
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".apichat").join("config.toml")
}
