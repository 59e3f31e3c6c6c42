//! Configuration types for Parley.
//!
//! `Settings` is the top-level `parley.toml` plus environment overrides.
//! Every field has a default, so an empty file (or no file) is valid and
//! yields a memory-only server with no completion key.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub completion: CompletionSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Completion API settings (OpenAI-compatible chat completions).
#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// API key. `None` means every chat turn fails with an `auth` error.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Whole-request timeout for one completion call.
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_completion_timeout_secs() -> u64 {
    60
}

impl CompletionSettings {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

// Keys are redacted from Debug output.
impl fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "****"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Which external store conversations are mirrored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Supabase,
    Sqlite,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Supabase => write!(f, "supabase"),
            StoreBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "none" => Ok(StoreBackend::Memory),
            "supabase" => Ok(StoreBackend::Supabase),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(format!("invalid store backend: '{other}'")),
        }
    }
}

/// External store settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Explicit backend. When unset, Supabase is used if both URL and key
    /// are present, otherwise memory-only.
    #[serde(default)]
    pub backend: Option<StoreBackend>,

    #[serde(default)]
    pub supabase_url: Option<String>,

    #[serde(default)]
    pub supabase_key: Option<String>,

    #[serde(default = "default_table")]
    pub table: String,

    /// SQLite URL, e.g. `sqlite://parley.db?mode=rwc`.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Upper bound for each individual store call.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_table() -> String {
    "conversations".to_string()
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

impl StoreSettings {
    pub fn has_supabase_credentials(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.supabase_url) && set(&self.supabase_key)
    }

    /// The backend that will actually be used.
    pub fn resolved_backend(&self) -> StoreBackend {
        match self.backend {
            Some(backend) => backend,
            None if self.has_supabase_credentials() => StoreBackend::Supabase,
            None => StoreBackend::Memory,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: None,
            supabase_url: None,
            supabase_key: None,
            table: default_table(),
            database_url: None,
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("backend", &self.backend)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &self.supabase_key.as_ref().map(|_| "****"))
            .field("table", &self.table)
            .field("database_url", &self.database_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
