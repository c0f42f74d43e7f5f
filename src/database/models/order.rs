use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnKind, TableSpec};

/// Cached WeClapp sales order
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub weclapp_id: String,
    pub order_number: String,
    pub customer_id: Option<String>,
    pub customer_number: Option<String>,
    pub customer_name: Option<String>,
    pub status: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
    pub planned_delivery_date: Option<DateTime<Utc>>,
    pub net_amount: Option<Decimal>,
    pub gross_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub responsible_user_id: Option<String>,
    pub created_by_user_id: Option<String>,
    pub is_active: bool,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub static ORDERS: TableSpec = TableSpec {
    name: "orders",
    columns: &[
        ("id", ColumnKind::Uuid),
        ("weclapp_id", ColumnKind::Text),
        ("order_number", ColumnKind::Text),
        ("customer_id", ColumnKind::Text),
        ("customer_number", ColumnKind::Text),
        ("customer_name", ColumnKind::Text),
        ("status", ColumnKind::Text),
        ("order_date", ColumnKind::Timestamp),
        ("planned_delivery_date", ColumnKind::Timestamp),
        ("net_amount", ColumnKind::Decimal),
        ("gross_amount", ColumnKind::Decimal),
        ("currency", ColumnKind::Text),
        ("responsible_user_id", ColumnKind::Text),
        ("created_by_user_id", ColumnKind::Text),
        ("is_active", ColumnKind::Boolean),
        ("last_sync_at", ColumnKind::Timestamp),
        ("created_at", ColumnKind::Timestamp),
        ("updated_at", ColumnKind::Timestamp),
    ],
    search_columns: &["order_number", "customer_name", "customer_number"],
    soft_scoped: true,
    default_order: "order_date desc",
};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpsert {
    pub weclapp_id: String,
    pub order_number: String,
    pub customer_id: Option<String>,
    pub customer_number: Option<String>,
    pub customer_name: Option<String>,
    pub status: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
    pub planned_delivery_date: Option<DateTime<Utc>>,
    pub net_amount: Option<Decimal>,
    pub gross_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub responsible_user_id: Option<String>,
    pub created_by_user_id: Option<String>,
}

impl OrderUpsert {
    pub async fn upsert(&self, pool: &PgPool) -> Result<Order, DatabaseError> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, weclapp_id, order_number, customer_id, customer_number, customer_name,
                status, order_date, planned_delivery_date, net_amount, gross_amount, currency,
                responsible_user_id, created_by_user_id, is_active, last_sync_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, TRUE, NOW(), NOW(), NOW())
            ON CONFLICT (weclapp_id) DO UPDATE SET
                order_number = EXCLUDED.order_number,
                customer_id = EXCLUDED.customer_id,
                customer_number = EXCLUDED.customer_number,
                customer_name = EXCLUDED.customer_name,
                status = EXCLUDED.status,
                order_date = EXCLUDED.order_date,
                planned_delivery_date = EXCLUDED.planned_delivery_date,
                net_amount = EXCLUDED.net_amount,
                gross_amount = EXCLUDED.gross_amount,
                currency = EXCLUDED.currency,
                responsible_user_id = EXCLUDED.responsible_user_id,
                created_by_user_id = EXCLUDED.created_by_user_id,
                is_active = TRUE,
                last_sync_at = NOW(),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&self.weclapp_id)
        .bind(&self.order_number)
        .bind(&self.customer_id)
        .bind(&self.customer_number)
        .bind(&self.customer_name)
        .bind(&self.status)
        .bind(self.order_date)
        .bind(self.planned_delivery_date)
        .bind(self.net_amount)
        .bind(self.gross_amount)
        .bind(&self.currency)
        .bind(&self.responsible_user_id)
        .bind(&self.created_by_user_id)
        .fetch_one(pool)
        .await?;

        Ok(order)
    }
}

pub async fn delete_by_weclapp_id(pool: &PgPool, weclapp_id: &str) -> Result<u64, DatabaseError> {
    let result = sqlx::query("DELETE FROM orders WHERE weclapp_id = $1")
        .bind(weclapp_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
