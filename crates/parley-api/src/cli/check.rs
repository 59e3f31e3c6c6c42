//! `parley check-store`: connectivity probe for the external store.
//!
//! Writes a throwaway record, reads it back, updates it and deletes it,
//! reporting each step. Exits non-zero if any step fails.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use console::style;
use serde::Serialize;

use parley_core::persistence::repository::ConversationRepository;
use parley_infra::store::open_repository;
use parley_types::config::Settings;
use parley_types::conversation::ConversationRecord;
use parley_types::error::RepositoryError;
use parley_types::message::Message;

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub step: &'static str,
    pub ok: bool,
    pub elapsed_ms: u64,
    pub detail: String,
}

async fn timed<T>(
    step: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T, RepositoryError>>,
) -> (StepReport, Option<T>) {
    let started = Instant::now();
    let result = tokio::time::timeout(limit, fut).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let (ok, detail, value) = match result {
        Ok(Ok(value)) => (true, "ok".to_string(), Some(value)),
        Ok(Err(e)) => (false, e.to_string(), None),
        Err(_) => (false, format!("timed out after {}ms", limit.as_millis()), None),
    };
    (
        StepReport {
            step,
            ok,
            elapsed_ms,
            detail,
        },
        value,
    )
}

/// Run the probe against `repo`. Stops at the first failing step, but always
/// attempts cleanup once the insert succeeded.
pub async fn run_probe<R: ConversationRepository>(repo: &R, limit: Duration) -> Vec<StepReport> {
    let probe_id = format!("parley-probe-{}", uuid::Uuid::now_v7());
    let mut reports = Vec::new();

    let record = ConversationRecord::new(&probe_id, vec![Message::user("connectivity probe")]);
    let (report, inserted) = timed("insert", limit, repo.insert(&record)).await;
    reports.push(report);
    if inserted.is_none() {
        return reports;
    }

    let (mut report, found) = timed("read", limit, repo.find(&probe_id)).await;
    if matches!(found, Some(None)) {
        report.ok = false;
        report.detail = "record not found after insert".to_string();
    }
    let read_ok = report.ok;
    reports.push(report);

    if read_ok {
        let updated = vec![
            Message::user("connectivity probe"),
            Message::assistant("probe reply"),
        ];
        let (report, _) = timed("update", limit, repo.update_messages(&probe_id, &updated)).await;
        reports.push(report);
    }

    let (report, _) = timed("delete", limit, repo.delete(&probe_id)).await;
    let deleted = report.ok;
    reports.push(report);

    if deleted {
        let (mut report, found) = timed("verify-delete", limit, repo.find(&probe_id)).await;
        if matches!(found, Some(Some(_))) {
            report.ok = false;
            report.detail = "record still present after delete".to_string();
        }
        reports.push(report);
    }

    reports
}

pub async fn check_store(settings: &Settings, json: bool) -> Result<()> {
    let Some(repo) = open_repository(&settings.store).await? else {
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "backend": "memory",
                    "ok": false,
                    "steps": [],
                }))?
            );
        } else {
            println!();
            println!(
                "  {} No external store configured (set SUPABASE_URL and SUPABASE_KEY, or PARLEY_STORE=sqlite)",
                style("✗").red()
            );
            println!();
        }
        bail!("no external store configured");
    };

    let limit = Duration::from_millis(settings.store.timeout_ms);
    let reports = run_probe(&repo, limit).await;
    let all_ok = reports.iter().all(|r| r.ok);

    if json {
        let out = serde_json::json!({
            "backend": repo.name(),
            "ok": all_ok,
            "steps": reports,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Probing {} store",
            style("🔍").bold(),
            style(repo.name()).cyan()
        );
        println!();
        for r in &reports {
            let mark = if r.ok {
                style("✓").green()
            } else {
                style("✗").red()
            };
            println!(
                "  {} {:<14} {:>6}ms  {}",
                mark,
                r.step,
                r.elapsed_ms,
                style(&r.detail).dim()
            );
        }
        println!();
    }

    if !all_ok {
        bail!("store check failed");
    }
    Ok(())
}
