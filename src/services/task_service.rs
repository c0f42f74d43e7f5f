use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{ServiceError, ServiceResult};
use crate::database::models::{task, Task};
use crate::weclapp::{
    client::TASK,
    models::{to_millis, TaskAssignee, TaskBody, WeclappTask},
    WeclappClient, WeclappError,
};

/// Create/patch body for tasks. On update, absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInput {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_user_id: Option<String>,
    pub customer_id: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub planned_effort_seconds: Option<i64>,
}

impl TaskInput {
    fn validate(&self, creating: bool) -> ServiceResult<()> {
        match self.subject.as_deref().map(str::trim) {
            Some("") => return Err(ServiceError::field("subject", "must not be empty")),
            None if creating => return Err(ServiceError::field("subject", "is required")),
            _ => {}
        }
        if self.planned_effort_seconds.is_some_and(|s| s < 0) {
            return Err(ServiceError::field("planned_effort_seconds", "must not be negative"));
        }
        if let (Some(from), Some(due)) = (self.date_from, self.due_date) {
            if due < from {
                return Err(ServiceError::field("due_date", "must not be before date_from"));
            }
        }
        Ok(())
    }

    fn into_body(self) -> TaskBody {
        TaskBody {
            subject: self.subject.map(|s| s.trim().to_string()),
            description: self.description,
            task_status: self.status,
            task_priority: self.priority,
            assignees: self
                .assignee_user_id
                .map(|user_id| vec![TaskAssignee { user_id }]),
            customer_id: self.customer_id,
            date_from: to_millis(self.date_from),
            due_date: to_millis(self.due_date),
            planned_effort: self.planned_effort_seconds,
        }
    }
}

/// Create in WeClapp, then cache the returned entity
pub async fn create(pool: &PgPool, client: &WeclappClient, input: TaskInput) -> ServiceResult<Task> {
    input.validate(true)?;
    let created: WeclappTask = client.create(TASK, &input.into_body()).await?;
    let cached = created.into_upsert()?.upsert(pool).await?;
    info!("Task {} created in WeClapp", cached.weclapp_id);
    Ok(cached)
}

/// Partial update written through to WeClapp
pub async fn update(pool: &PgPool, client: &WeclappClient, existing: &Task, input: TaskInput) -> ServiceResult<Task> {
    input.validate(false)?;
    let updated: WeclappTask = client
        .update(TASK, &existing.weclapp_id, &input.into_body())
        .await?;
    let cached = updated.into_upsert()?.upsert(pool).await?;
    info!("Task {} updated in WeClapp", cached.weclapp_id);
    Ok(cached)
}

/// Delete in WeClapp, then locally. A task already gone from WeClapp is
/// still removed from the cache.
pub async fn delete(pool: &PgPool, client: &WeclappClient, existing: &Task) -> ServiceResult<()> {
    match client.delete(TASK, &existing.weclapp_id).await {
        Ok(()) => {}
        Err(WeclappError::NotFound(_)) => {
            warn!("Task {} was already deleted in WeClapp", existing.weclapp_id);
        }
        Err(e) => return Err(e.into()),
    }
    task::delete_by_weclapp_id(pool, &existing.weclapp_id).await?;
    info!("Task {} deleted", existing.weclapp_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn create_requires_subject() {
        let input = TaskInput::default();
        assert!(matches!(input.validate(true), Err(ServiceError::Validation { .. })));
        assert!(input.validate(false).is_ok());

        let blank = TaskInput {
            subject: Some("   ".into()),
            ..Default::default()
        };
        assert!(blank.validate(false).is_err());
    }

    #[test]
    fn due_date_cannot_precede_start() {
        let input = TaskInput {
            subject: Some("Install".into()),
            date_from: Some(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()),
            due_date: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(input.validate(true).is_err());
    }

    #[test]
    fn body_leaves_out_untouched_fields() {
        let input = TaskInput {
            subject: Some(" Call back ".into()),
            assignee_user_id: Some("42".into()),
            due_date: Some(Utc.timestamp_millis_opt(1_714_521_600_000).unwrap()),
            ..Default::default()
        };
        let body = serde_json::to_value(input.into_body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "subject": "Call back",
                "assignees": [{"userId": "42"}],
                "dueDate": 1_714_521_600_000_i64,
            })
        );
    }
}
