//! `parley status`: resolved configuration at a glance.

use anyhow::Result;
use console::style;

use parley_types::config::{Settings, StoreBackend};

fn check_mark(ok: bool) -> String {
    if ok {
        format!("{}", style("✓").green())
    } else {
        format!("{}", style("✗").red())
    }
}

/// Never prints secrets, only whether they are set.
pub fn status(settings: &Settings, json: bool) -> Result<()> {
    let backend = settings.store.resolved_backend();
    let key_set = settings.completion.has_api_key();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "server": {
                "host": settings.server.host,
                "port": settings.server.port,
            },
            "completion": {
                "openaiKeySet": key_set,
                "baseUrl": settings.completion.base_url,
                "model": settings.completion.model,
                "timeoutSecs": settings.completion.timeout_secs,
            },
            "store": {
                "backend": backend.to_string(),
                "supabaseConfigured": settings.store.has_supabase_credentials(),
                "table": settings.store.table,
                "timeoutMs": settings.store.timeout_ms,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Parley v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Completion ──").dim());
    println!("  {} OPENAI_API_KEY set", check_mark(key_set));
    println!("  Model:    {}", style(&settings.completion.model).bold());
    println!("  Endpoint: {}", settings.completion.base_url);
    println!();

    println!("  {}", style("── Store ──").dim());
    println!("  Backend:  {}", style(backend).bold());
    match backend {
        StoreBackend::Memory => {
            println!(
                "  {}",
                style("Conversations are kept in memory only and lost on restart.").yellow()
            );
        }
        StoreBackend::Supabase => {
            println!(
                "  {} SUPABASE_URL / SUPABASE_KEY set",
                check_mark(settings.store.has_supabase_credentials())
            );
            println!("  Table:    {}", settings.store.table);
        }
        StoreBackend::Sqlite => {
            println!(
                "  Database: {}",
                settings
                    .store
                    .database_url
                    .as_deref()
                    .unwrap_or(parley_infra::sqlite::pool::DEFAULT_DATABASE_URL)
            );
        }
    }
    println!();

    println!("  {}", style("── Server ──").dim());
    println!(
        "  Listen:   {}",
        style(format!("http://{}:{}", settings.server.host, settings.server.port)).cyan()
    );
    println!();

    Ok(())
}
