//! Settings loader for Parley.
//!
//! Reads an optional TOML file into [`Settings`], then overlays environment
//! variables. Falls back to defaults when the file is missing or malformed.

use std::path::Path;

use tracing::warn;

use parley_types::config::{Settings, StoreBackend};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "parley.toml";

/// Load settings from `path` (or `parley.toml`), then apply the process
/// environment.
pub async fn load_settings(path: Option<&Path>) -> Settings {
    let mut settings = read_config_file(path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE))).await;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// - Missing file: defaults.
/// - Unreadable or unparsable file: warning, then defaults.
pub async fn read_config_file(path: &Path) -> Settings {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Settings::default();
        }
        Err(err) => {
            warn!("Failed to read {}: {err}, using defaults", path.display());
            return Settings::default();
        }
    };

    match toml::from_str::<Settings>(&content) {
        Ok(settings) => settings,
        Err(err) => {
            warn!("Failed to parse {}: {err}, using defaults", path.display());
            Settings::default()
        }
    }
}

/// Overlay environment variables on top of file settings. Empty values are
/// ignored. `lookup` is injectable so tests don't touch the process env.
pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("OPENAI_API_KEY") {
        settings.completion.api_key = Some(v);
    }
    if let Some(v) = get("OPENAI_BASE_URL") {
        settings.completion.base_url = v;
    }
    if let Some(v) = get("OPENAI_MODEL") {
        settings.completion.model = v;
    }
    if let Some(v) = get("PARLEY_SYSTEM_PROMPT") {
        settings.completion.system_prompt = v;
    }

    if let Some(v) = get("SUPABASE_URL") {
        settings.store.supabase_url = Some(v);
    }
    if let Some(v) = get("SUPABASE_KEY").or_else(|| get("SUPABASE_ANON_KEY")) {
        settings.store.supabase_key = Some(v);
    }
    if let Some(v) = get("PARLEY_STORE") {
        match v.parse::<StoreBackend>() {
            Ok(backend) => settings.store.backend = Some(backend),
            Err(e) => warn!("Ignoring PARLEY_STORE: {e}"),
        }
    }
    if let Some(v) = get("PARLEY_DATABASE_URL") {
        settings.store.database_url = Some(v);
    }

    if let Some(v) = get("HOST") {
        settings.server.host = v;
    }
    if let Some(v) = get("PORT") {
        match v.parse::<u16>() {
            Ok(port) => settings.server.port = port,
            Err(e) => warn!("Ignoring PORT={v}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let settings = read_config_file(&tmp.path().join("parley.toml")).await;
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.completion.model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parley.toml");
        tokio::fs::write(
            &path,
            r#"
[server]
port = 8080

[completion]
model = "gpt-4o-mini"
temperature = 0.2

[store]
backend = "sqlite"
database_url = "sqlite://chat.db?mode=rwc"
"#,
        )
        .await
        .unwrap();

        let settings = read_config_file(&path).await;
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.completion.model, "gpt-4o-mini");
        assert_eq!(settings.completion.temperature, Some(0.2));
        assert_eq!(settings.store.resolved_backend(), StoreBackend::Sqlite);
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parley.toml");
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let settings = read_config_file(&path).await;
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("OPENAI_API_KEY", "sk-env"),
                ("OPENAI_MODEL", "gpt-4o"),
                ("PORT", "4000"),
                ("HOST", "0.0.0.0"),
                ("SUPABASE_URL", "https://x.supabase.co"),
                ("SUPABASE_ANON_KEY", "anon"),
            ]),
        );

        assert_eq!(settings.completion.api_key.as_deref(), Some("sk-env"));
        assert_eq!(settings.completion.model, "gpt-4o");
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.store.supabase_key.as_deref(), Some("anon"));
        assert_eq!(settings.store.resolved_backend(), StoreBackend::Supabase);
    }

    #[test]
    fn supabase_key_wins_over_anon_key() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            env(&[("SUPABASE_KEY", "service"), ("SUPABASE_ANON_KEY", "anon")]),
        );
        assert_eq!(settings.store.supabase_key.as_deref(), Some("service"));
    }

    #[test]
    fn empty_and_invalid_values_are_ignored() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            env(&[("OPENAI_API_KEY", ""), ("PORT", "not-a-port"), ("PARLEY_STORE", "redis")]),
        );
        assert!(settings.completion.api_key.is_none());
        assert_eq!(settings.server.port, 3000);
        assert!(settings.store.backend.is_none());
    }

    #[test]
    fn explicit_memory_store_disables_supabase() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("SUPABASE_URL", "https://x.supabase.co"),
                ("SUPABASE_KEY", "k"),
                ("PARLEY_STORE", "memory"),
            ]),
        );
        assert_eq!(settings.store.resolved_backend(), StoreBackend::Memory);
    }
}
