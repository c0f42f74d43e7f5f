//! WeClapp REST payloads and their mapping onto the local cache rows.
//!
//! WeClapp sends timestamps as epoch milliseconds and money amounts as decimal
//! strings. Ids are strings throughout.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use super::error::WeclappError;
use crate::database::models::{ErpUserUpsert, OrderUpsert, PartyUpsert, TaskUpsert, TimeEntryUpsert};

/// `{"result": ...}` wrapper used by list and count responses
#[derive(Debug, Deserialize)]
pub struct ResultEnvelope<T> {
    pub result: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeclappUser {
    pub id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignee {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeclappTask {
    pub id: String,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub task_status: Option<String>,
    pub task_priority: Option<String>,
    #[serde(default)]
    pub assignees: Vec<TaskAssignee>,
    pub creator_user_id: Option<String>,
    pub customer_id: Option<String>,
    pub date_from: Option<i64>,
    pub due_date: Option<i64>,
    /// Seconds
    pub planned_effort: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceAddress {
    pub company: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeclappSalesOrder {
    pub id: String,
    pub order_number: Option<String>,
    pub customer_id: Option<String>,
    pub customer_number: Option<String>,
    pub invoice_address: Option<InvoiceAddress>,
    pub status: Option<String>,
    pub order_date: Option<i64>,
    pub planned_delivery_date: Option<i64>,
    pub net_amount: Option<Value>,
    pub gross_amount: Option<Value>,
    pub record_currency_name: Option<String>,
    pub responsible_user_id: Option<String>,
    pub created_by_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeclappParty {
    pub id: String,
    pub party_type: Option<String>,
    #[serde(default)]
    pub customer: bool,
    #[serde(default)]
    pub supplier: bool,
    pub company: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_number: Option<String>,
    pub responsible_user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeclappTimeRecord {
    pub id: String,
    pub task_id: Option<String>,
    pub user_id: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<i64>,
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub billable: bool,
}

/// Body for task create/update; absent fields are left out of the request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<TaskAssignee>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_effort: Option<i64>,
}

pub fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

pub fn to_millis(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|ts| ts.timestamp_millis())
}

/// Amounts arrive as strings ("12.50") but tolerate plain numbers
fn decimal(value: &Option<Value>) -> Option<Decimal> {
    match value {
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl WeclappUser {
    pub fn into_upsert(self) -> ErpUserUpsert {
        let is_active = self
            .status
            .as_deref()
            .map_or(true, |status| status.eq_ignore_ascii_case("ACTIVE"));
        ErpUserUpsert {
            weclapp_id: self.id,
            username: non_empty(self.username),
            first_name: non_empty(self.first_name),
            last_name: non_empty(self.last_name),
            email: non_empty(self.email).map(|e| e.trim().to_lowercase()),
            status: self.status,
            is_active,
        }
    }
}

impl WeclappTask {
    pub fn into_upsert(self) -> Result<TaskUpsert, WeclappError> {
        let subject = non_empty(self.subject)
            .ok_or_else(|| WeclappError::Mapping(format!("task {} has no subject", self.id)))?;
        Ok(TaskUpsert {
            // first assignee is the responsible one
            assignee_user_id: self.assignees.into_iter().next().map(|a| a.user_id),
            weclapp_id: self.id,
            subject,
            description: non_empty(self.description),
            status: self.task_status,
            priority: self.task_priority,
            creator_user_id: self.creator_user_id,
            customer_id: self.customer_id,
            date_from: from_millis(self.date_from),
            due_date: from_millis(self.due_date),
            planned_effort_seconds: self.planned_effort,
        })
    }
}

impl WeclappSalesOrder {
    pub fn into_upsert(self) -> Result<OrderUpsert, WeclappError> {
        let order_number = non_empty(self.order_number)
            .ok_or_else(|| WeclappError::Mapping(format!("sales order {} has no order number", self.id)))?;
        let customer_name = self.invoice_address.and_then(|address| {
            non_empty(address.company).or_else(|| {
                let name = [address.first_name, address.last_name]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                non_empty(Some(name))
            })
        });
        Ok(OrderUpsert {
            net_amount: decimal(&self.net_amount),
            gross_amount: decimal(&self.gross_amount),
            weclapp_id: self.id,
            order_number,
            customer_id: self.customer_id,
            customer_number: self.customer_number,
            customer_name,
            status: self.status,
            order_date: from_millis(self.order_date),
            planned_delivery_date: from_millis(self.planned_delivery_date),
            currency: self.record_currency_name,
            responsible_user_id: self.responsible_user_id,
            created_by_user_id: self.created_by_id,
        })
    }
}

impl WeclappParty {
    pub fn into_upsert(self) -> PartyUpsert {
        PartyUpsert {
            weclapp_id: self.id,
            party_type: self.party_type,
            is_customer: self.customer,
            is_supplier: self.supplier,
            company_name: non_empty(self.company),
            first_name: non_empty(self.first_name),
            last_name: non_empty(self.last_name),
            email: non_empty(self.email),
            phone: non_empty(self.phone),
            customer_number: self.customer_number,
            responsible_user_id: self.responsible_user_id,
        }
    }
}

impl WeclappTimeRecord {
    pub fn into_upsert(self) -> TimeEntryUpsert {
        TimeEntryUpsert {
            weclapp_id: self.id,
            task_id: self.task_id,
            user_id: self.user_id,
            description: non_empty(self.description),
            start_date: from_millis(self.start_date),
            duration_seconds: self.duration_seconds.unwrap_or(0).max(0),
            billable: self.billable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_maps_first_assignee_and_millis() {
        let task: WeclappTask = serde_json::from_value(json!({
            "id": "4711",
            "subject": "Call customer",
            "taskStatus": "IN_PROGRESS",
            "taskPriority": "HIGH",
            "assignees": [{"userId": "u1"}, {"userId": "u2"}],
            "creatorUserId": "u9",
            "dueDate": 1_700_000_000_000i64,
            "plannedEffort": 3600,
            "unknownField": true
        }))
        .unwrap();
        let upsert = task.into_upsert().unwrap();
        assert_eq!(upsert.weclapp_id, "4711");
        assert_eq!(upsert.assignee_user_id.as_deref(), Some("u1"));
        assert_eq!(upsert.creator_user_id.as_deref(), Some("u9"));
        assert_eq!(upsert.due_date.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(upsert.planned_effort_seconds, Some(3600));
        assert_eq!(upsert.date_from, None);
    }

    #[test]
    fn task_without_subject_fails_to_map() {
        let task: WeclappTask = serde_json::from_value(json!({"id": "1", "subject": "  "})).unwrap();
        assert!(matches!(task.into_upsert(), Err(WeclappError::Mapping(_))));
    }

    #[test]
    fn sales_order_parses_string_amounts() {
        let order: WeclappSalesOrder = serde_json::from_value(json!({
            "id": "88",
            "orderNumber": "SO-1001",
            "netAmount": "1250.50",
            "grossAmount": 1488.1,
            "recordCurrencyName": "EUR",
            "createdById": "u3",
            "invoiceAddress": {"firstName": "Ada", "lastName": "Lovelace"}
        }))
        .unwrap();
        let upsert = order.into_upsert().unwrap();
        assert_eq!(upsert.net_amount, Some(Decimal::from_str("1250.50").unwrap()));
        assert_eq!(upsert.gross_amount, Some(Decimal::from_str("1488.1").unwrap()));
        assert_eq!(upsert.customer_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(upsert.created_by_user_id.as_deref(), Some("u3"));
    }

    #[test]
    fn erp_user_activity_follows_status() {
        let active: WeclappUser = serde_json::from_value(json!({"id": "1", "email": " Bob@Corp.DE ", "status": "ACTIVE"})).unwrap();
        let inactive: WeclappUser = serde_json::from_value(json!({"id": "2", "status": "NOT_ACTIVE"})).unwrap();
        let active = active.into_upsert();
        assert!(active.is_active);
        assert_eq!(active.email.as_deref(), Some("bob@corp.de"));
        assert!(!inactive.into_upsert().is_active);
    }

    #[test]
    fn time_record_clamps_missing_duration() {
        let record: WeclappTimeRecord = serde_json::from_value(json!({"id": "5", "taskId": "4711"})).unwrap();
        let upsert = record.into_upsert();
        assert_eq!(upsert.duration_seconds, 0);
        assert!(!upsert.billable);
    }

    #[test]
    fn task_body_skips_absent_fields() {
        let body = TaskBody {
            subject: Some("New".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&body).unwrap(), json!({"subject": "New"}));
    }
}
