use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::BTreeMap;

use super::ServiceResult;
use crate::database::models::{
    webhook_log, Order, Party, Task, TimeEntry, User, WebhookLog, ORDERS, PARTIES, TASKS, TIME_ENTRIES, USERS,
    WEBHOOK_LOGS,
};
use crate::database::Repository;
use crate::filter::{FilterData, TableSpec};
use crate::permissions::{self, scope, DataType, ResolvedRole};

/// Task statuses that no longer count as open work
pub const CLOSED_TASK_STATUSES: &[&str] = &["COMPLETED", "CANCELLED"];

#[derive(Debug, Default, Serialize)]
pub struct DashboardStats {
    /// Visible row counts, only for data types the role may read
    pub counts: BTreeMap<&'static str, i64>,
    pub tasks: Option<TaskStats>,
    pub webhooks: Option<WebhookStats>,
    pub users: Option<BTreeMap<String, i64>>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TaskStats {
    pub open: i64,
    pub overdue: i64,
    pub due_this_week: i64,
}

#[derive(Debug, Serialize)]
pub struct WebhookStats {
    pub received_24h: i64,
    pub failed_24h: i64,
    pub failed_total: i64,
}

fn read_permission(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Tasks => permissions::TASKS_READ,
        DataType::Orders => permissions::ORDERS_READ,
        DataType::Parties => permissions::PARTIES_READ,
        DataType::TimeEntries => permissions::TIME_ENTRIES_READ,
    }
}

/// Combine the scope condition with extra conditions
fn scoped(scope: Option<&Value>, extra: Vec<Value>) -> FilterData {
    let mut conditions = extra;
    if let Some(scope) = scope {
        conditions.push(scope.clone());
    }
    FilterData {
        where_clause: if conditions.is_empty() {
            None
        } else {
            Some(json!({ "$and": conditions }))
        },
        ..Default::default()
    }
}

fn open_task_condition() -> Value {
    json!({
        "$or": [
            { "status": { "$null": true } },
            { "status": { "$nin": CLOSED_TASK_STATUSES } },
        ]
    })
}

async fn count_rows<T>(pool: &PgPool, table: &'static TableSpec, filter: FilterData) -> ServiceResult<i64>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Sync + Unpin,
{
    Ok(Repository::<T>::new(table, pool.clone()).count(filter).await?)
}

/// Everything on the landing page, restricted to what the caller may see
pub async fn stats(pool: &PgPool, user: &User, role: &ResolvedRole) -> ServiceResult<DashboardStats> {
    let now = Utc::now();
    let mut stats = DashboardStats {
        generated_at: now,
        ..Default::default()
    };

    for data_type in DataType::ALL {
        if !role.has(read_permission(data_type)) {
            continue;
        }
        let condition = scope::condition_for(pool, user, role, data_type).await?.to_where();
        let filter = scoped(condition.as_ref(), vec![]);
        let count = match data_type {
            DataType::Tasks => count_rows::<Task>(pool, &TASKS, filter).await?,
            DataType::Orders => count_rows::<Order>(pool, &ORDERS, filter).await?,
            DataType::Parties => count_rows::<Party>(pool, &PARTIES, filter).await?,
            DataType::TimeEntries => count_rows::<TimeEntry>(pool, &TIME_ENTRIES, filter).await?,
        };
        stats.counts.insert(data_type.as_str(), count);

        if data_type == DataType::Tasks {
            let open = count_rows::<Task>(pool, &TASKS, scoped(condition.as_ref(), vec![open_task_condition()])).await?;
            let overdue = count_rows::<Task>(
                pool,
                &TASKS,
                scoped(
                    condition.as_ref(),
                    vec![open_task_condition(), json!({ "due_date": { "$lt": now.to_rfc3339() } })],
                ),
            )
            .await?;
            let due_this_week = count_rows::<Task>(
                pool,
                &TASKS,
                scoped(
                    condition.as_ref(),
                    vec![
                        open_task_condition(),
                        json!({ "due_date": { "$between": [now.to_rfc3339(), (now + Duration::days(7)).to_rfc3339()] } }),
                    ],
                ),
            )
            .await?;
            stats.tasks = Some(TaskStats {
                open,
                overdue,
                due_this_week,
            });
        }
    }

    if role.has(permissions::WEBHOOKS_READ) {
        let since = (now - Duration::hours(24)).to_rfc3339();
        let received_24h = count_rows::<WebhookLog>(
            pool,
            &WEBHOOK_LOGS,
            scoped(None, vec![json!({ "received_at": { "$gte": since } })]),
        )
        .await?;
        let failed_24h = count_rows::<WebhookLog>(
            pool,
            &WEBHOOK_LOGS,
            scoped(
                None,
                vec![json!({ "status": webhook_log::STATUS_FAILED, "received_at": { "$gte": since } })],
            ),
        )
        .await?;
        let failed_total = count_rows::<WebhookLog>(
            pool,
            &WEBHOOK_LOGS,
            scoped(None, vec![json!({ "status": webhook_log::STATUS_FAILED })]),
        )
        .await?;
        stats.webhooks = Some(WebhookStats {
            received_24h,
            failed_24h,
            failed_total,
        });
    }

    if role.has(permissions::USERS_READ) {
        let mut by_status = BTreeMap::new();
        for status in ["PENDING", "ACTIVE", "INACTIVE"] {
            let count = count_rows::<User>(pool, &USERS, scoped(None, vec![json!({ "status": status })])).await?;
            by_status.insert(status.to_string(), count);
        }
        stats.users = Some(by_status);
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_is_and_ed_with_extra_conditions() {
        let scope = json!({"assignee_user_id": "7"});
        let filter = scoped(Some(&scope), vec![json!({"status": "OPEN"})]);
        assert_eq!(
            filter.where_clause,
            Some(json!({"$and": [{"status": "OPEN"}, {"assignee_user_id": "7"}]}))
        );
        assert!(scoped(None, vec![]).where_clause.is_none());
    }

    #[test]
    fn open_tasks_include_missing_status() {
        let condition = open_task_condition();
        let alternatives = condition["$or"].as_array().unwrap();
        assert_eq!(alternatives[0], json!({"status": {"$null": true}}));
        assert_eq!(alternatives[1]["status"]["$nin"], json!(["COMPLETED", "CANCELLED"]));
    }

    #[test]
    fn each_data_type_has_a_read_permission() {
        for data_type in DataType::ALL {
            assert!(permissions::is_known_permission(read_permission(data_type)));
        }
    }
}
