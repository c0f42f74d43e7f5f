use anyhow::{bail, Context};

use crate::cli::SyncTarget;
use crate::config;
use crate::database::DatabaseManager;
use crate::services::sync_service::{SyncReport, SyncService};

pub async fn handle(target: SyncTarget, json: bool) -> anyhow::Result<()> {
    let config = config::config();
    let client = super::weclapp_client(config)?;
    if !client.is_configured() {
        bail!("WeClapp is not configured; set WECLAPP_BASE_URL (or WECLAPP_TENANT) and WECLAPP_API_TOKEN");
    }
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to the database")?;

    let service = SyncService::new(&pool, &client);
    let mut reports = Vec::new();
    for entity in target.entities() {
        let report = service
            .sync(entity)
            .await
            .with_context(|| format!("sync of {} failed", entity.as_str()))?;
        if !json {
            print_report(&report);
        }
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    let failed: usize = reports.iter().map(|r| r.failed).sum();
    if failed > 0 {
        tracing::warn!("{} record(s) could not be synced; see the log above", failed);
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    let elapsed = report.finished_at - report.started_at;
    println!(
        "✓ {:<13} fetched {:>6}  upserted {:>6}  failed {:>4}  deactivated {:>4}  ({} ms)",
        report.entity,
        report.fetched,
        report.upserted,
        report.failed,
        report.deactivated,
        elapsed.num_milliseconds()
    );
}
