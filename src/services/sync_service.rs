use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};

use super::ServiceResult;
use crate::database::models::{erp_user, order, party, task, time_entry};
use crate::webhook::EntityKind;
use crate::weclapp::{
    client as resources,
    models::{WeclappParty, WeclappSalesOrder, WeclappTask, WeclappTimeRecord, WeclappUser},
    WeclappClient, WeclappError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEntity {
    Users,
    Tasks,
    Orders,
    Parties,
    TimeEntries,
}

impl SyncEntity {
    /// Users first so ERP candidates exist before anything references them
    pub const ALL: [SyncEntity; 5] = [
        SyncEntity::Users,
        SyncEntity::Tasks,
        SyncEntity::Orders,
        SyncEntity::Parties,
        SyncEntity::TimeEntries,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "users" => Some(SyncEntity::Users),
            "tasks" => Some(SyncEntity::Tasks),
            "orders" => Some(SyncEntity::Orders),
            "parties" => Some(SyncEntity::Parties),
            "time-entries" | "time_entries" => Some(SyncEntity::TimeEntries),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEntity::Users => "users",
            SyncEntity::Tasks => "tasks",
            SyncEntity::Orders => "orders",
            SyncEntity::Parties => "parties",
            SyncEntity::TimeEntries => "time_entries",
        }
    }

    pub fn resource(&self) -> &'static str {
        match self {
            SyncEntity::Users => resources::USER,
            SyncEntity::Tasks => resources::TASK,
            SyncEntity::Orders => resources::SALES_ORDER,
            SyncEntity::Parties => resources::PARTY,
            SyncEntity::TimeEntries => resources::TIME_RECORD,
        }
    }

    fn table(&self) -> &'static str {
        match self {
            SyncEntity::Users => "erp_users",
            SyncEntity::Tasks => "tasks",
            SyncEntity::Orders => "orders",
            SyncEntity::Parties => "parties",
            SyncEntity::TimeEntries => "time_entries",
        }
    }
}

impl From<EntityKind> for SyncEntity {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Task => SyncEntity::Tasks,
            EntityKind::SalesOrder => SyncEntity::Orders,
            EntityKind::TimeRecord => SyncEntity::TimeEntries,
            EntityKind::Party => SyncEntity::Parties,
            EntityKind::User => SyncEntity::Users,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub entity: &'static str,
    pub fetched: usize,
    pub upserted: usize,
    pub failed: usize,
    /// Rows not seen in this run, now marked inactive
    pub deactivated: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SyncStatus {
    pub entity: String,
    pub count: i64,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Pulls ERP entities and keeps the local cache keyed by WeClapp id
pub struct SyncService<'a> {
    pool: &'a PgPool,
    client: &'a WeclappClient,
}

impl<'a> SyncService<'a> {
    pub fn new(pool: &'a PgPool, client: &'a WeclappClient) -> Self {
        Self { pool, client }
    }

    /// Full pull of one entity type. Records that fail to map or upsert are
    /// counted and skipped; transport errors abort the run. After a clean run,
    /// cached rows WeClapp no longer returned are marked inactive.
    pub async fn sync(&self, entity: SyncEntity) -> ServiceResult<SyncReport> {
        let started_at = Utc::now();
        // upserts stamp last_sync_at with the database clock
        let cutoff: DateTime<Utc> = sqlx::query_scalar("SELECT NOW()")
            .fetch_one(self.pool)
            .await
            .map_err(crate::database::DatabaseError::from)?;
        let page_size = self.client.page_size();
        let (mut fetched, mut upserted, mut failed) = (0, 0, 0);

        info!("Sync of {} started", entity.as_str());
        let mut page = 1;
        loop {
            let batch: Vec<Value> = self.client.list_page(entity.resource(), page, page_size).await?;
            let short = batch.len() < page_size as usize;
            fetched += batch.len();

            for record in batch {
                let id = record.get("id").cloned().unwrap_or(Value::Null);
                match self.upsert_record(entity, record).await {
                    Ok(()) => upserted += 1,
                    Err(e) => {
                        failed += 1;
                        warn!("Skipping {} record {}: {}", entity.as_str(), id, e);
                    }
                }
            }

            if short {
                break;
            }
            page += 1;
        }

        let deactivated = if failed == 0 {
            self.deactivate_stale(entity, cutoff).await?
        } else {
            warn!(
                "Sync of {} had {} failed record(s); leaving unseen rows active",
                entity.as_str(),
                failed
            );
            0
        };

        let report = SyncReport {
            entity: entity.as_str(),
            fetched,
            upserted,
            failed,
            deactivated,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Sync of {} finished: fetched={} upserted={} failed={} deactivated={}",
            report.entity, report.fetched, report.upserted, report.failed, report.deactivated
        );
        Ok(report)
    }

    async fn deactivate_stale(&self, entity: SyncEntity, cutoff: DateTime<Utc>) -> ServiceResult<u64> {
        // table names come from a closed set
        let sql = format!(
            "UPDATE \"{}\" SET is_active = FALSE, updated_at = NOW() WHERE is_active AND last_sync_at < $1",
            entity.table()
        );
        let result = sqlx::query(&sql)
            .bind(cutoff)
            .execute(self.pool)
            .await
            .map_err(crate::database::DatabaseError::from)?;
        Ok(result.rows_affected())
    }

    pub async fn sync_all(&self) -> ServiceResult<Vec<SyncReport>> {
        let mut reports = Vec::with_capacity(SyncEntity::ALL.len());
        for entity in SyncEntity::ALL {
            reports.push(self.sync(entity).await?);
        }
        Ok(reports)
    }

    /// Map one raw WeClapp record and upsert it
    pub async fn upsert_record(&self, entity: SyncEntity, record: Value) -> ServiceResult<()> {
        let decode = |e: serde_json::Error| WeclappError::Decode(e.to_string());
        match entity {
            SyncEntity::Users => {
                let user: WeclappUser = serde_json::from_value(record).map_err(decode)?;
                user.into_upsert().upsert(self.pool).await?;
            }
            SyncEntity::Tasks => {
                let task: WeclappTask = serde_json::from_value(record).map_err(decode)?;
                task.into_upsert()?.upsert(self.pool).await?;
            }
            SyncEntity::Orders => {
                let order: WeclappSalesOrder = serde_json::from_value(record).map_err(decode)?;
                order.into_upsert()?.upsert(self.pool).await?;
            }
            SyncEntity::Parties => {
                let party: WeclappParty = serde_json::from_value(record).map_err(decode)?;
                party.into_upsert().upsert(self.pool).await?;
            }
            SyncEntity::TimeEntries => {
                let record: WeclappTimeRecord = serde_json::from_value(record).map_err(decode)?;
                record.into_upsert().upsert(self.pool).await?;
            }
        }
        Ok(())
    }

    /// Re-fetch a single entity from WeClapp and upsert it
    pub async fn refresh(&self, entity: SyncEntity, weclapp_id: &str) -> ServiceResult<()> {
        let record: Value = self.client.get(entity.resource(), weclapp_id).await?;
        self.upsert_record(entity, record).await
    }

    /// Drop the local copy of an entity deleted in WeClapp
    pub async fn remove(&self, entity: SyncEntity, weclapp_id: &str) -> ServiceResult<u64> {
        let removed = match entity {
            SyncEntity::Users => erp_user::delete_by_weclapp_id(self.pool, weclapp_id).await?,
            SyncEntity::Tasks => task::delete_by_weclapp_id(self.pool, weclapp_id).await?,
            SyncEntity::Orders => order::delete_by_weclapp_id(self.pool, weclapp_id).await?,
            SyncEntity::Parties => party::delete_by_weclapp_id(self.pool, weclapp_id).await?,
            SyncEntity::TimeEntries => time_entry::delete_by_weclapp_id(self.pool, weclapp_id).await?,
        };
        Ok(removed)
    }
}

/// Row count and latest sync time per cached entity
pub async fn status(pool: &PgPool) -> ServiceResult<Vec<SyncStatus>> {
    let mut statuses = Vec::with_capacity(SyncEntity::ALL.len());
    for entity in SyncEntity::ALL {
        // table names come from a closed set
        let sql = format!(
            "SELECT $1::text AS entity, COUNT(*) AS count, MAX(last_sync_at) AS last_sync_at FROM \"{}\"",
            entity.table()
        );
        let row = sqlx::query_as::<_, SyncStatus>(&sql)
            .bind(entity.as_str())
            .fetch_one(pool)
            .await
            .map_err(crate::database::DatabaseError::from)?;
        statuses.push(row);
    }
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_and_route_names() {
        assert_eq!(SyncEntity::parse("time-entries"), Some(SyncEntity::TimeEntries));
        assert_eq!(SyncEntity::parse("time_entries"), Some(SyncEntity::TimeEntries));
        assert_eq!(SyncEntity::parse("orders").map(|e| e.resource()), Some("salesOrder"));
        assert_eq!(SyncEntity::parse("invoices"), None);
    }

    #[test]
    fn webhook_kinds_map_to_entities() {
        assert_eq!(SyncEntity::from(EntityKind::TimeRecord), SyncEntity::TimeEntries);
        assert_eq!(SyncEntity::from(EntityKind::Party).table(), "parties");
        assert_eq!(SyncEntity::ALL[0], SyncEntity::Users);
    }
}
