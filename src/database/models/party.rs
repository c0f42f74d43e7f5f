use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnKind, TableSpec};

/// Cached WeClapp party (customer, supplier or contact)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Party {
    pub id: Uuid,
    pub weclapp_id: String,
    pub party_type: Option<String>,
    pub is_customer: bool,
    pub is_supplier: bool,
    pub company_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_number: Option<String>,
    pub responsible_user_id: Option<String>,
    pub is_active: bool,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub static PARTIES: TableSpec = TableSpec {
    name: "parties",
    columns: &[
        ("id", ColumnKind::Uuid),
        ("weclapp_id", ColumnKind::Text),
        ("party_type", ColumnKind::Text),
        ("is_customer", ColumnKind::Boolean),
        ("is_supplier", ColumnKind::Boolean),
        ("company_name", ColumnKind::Text),
        ("first_name", ColumnKind::Text),
        ("last_name", ColumnKind::Text),
        ("email", ColumnKind::Text),
        ("phone", ColumnKind::Text),
        ("customer_number", ColumnKind::Text),
        ("responsible_user_id", ColumnKind::Text),
        ("is_active", ColumnKind::Boolean),
        ("last_sync_at", ColumnKind::Timestamp),
        ("created_at", ColumnKind::Timestamp),
        ("updated_at", ColumnKind::Timestamp),
    ],
    search_columns: &["company_name", "first_name", "last_name", "email", "customer_number"],
    soft_scoped: true,
    default_order: "company_name, last_name",
};

#[derive(Debug, Clone, PartialEq)]
pub struct PartyUpsert {
    pub weclapp_id: String,
    pub party_type: Option<String>,
    pub is_customer: bool,
    pub is_supplier: bool,
    pub company_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_number: Option<String>,
    pub responsible_user_id: Option<String>,
}

impl PartyUpsert {
    pub async fn upsert(&self, pool: &PgPool) -> Result<Party, DatabaseError> {
        let party = sqlx::query_as::<_, Party>(
            r#"
            INSERT INTO parties (
                id, weclapp_id, party_type, is_customer, is_supplier, company_name,
                first_name, last_name, email, phone, customer_number, responsible_user_id,
                is_active, last_sync_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, TRUE, NOW(), NOW(), NOW())
            ON CONFLICT (weclapp_id) DO UPDATE SET
                party_type = EXCLUDED.party_type,
                is_customer = EXCLUDED.is_customer,
                is_supplier = EXCLUDED.is_supplier,
                company_name = EXCLUDED.company_name,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                customer_number = EXCLUDED.customer_number,
                responsible_user_id = EXCLUDED.responsible_user_id,
                is_active = TRUE,
                last_sync_at = NOW(),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&self.weclapp_id)
        .bind(&self.party_type)
        .bind(self.is_customer)
        .bind(self.is_supplier)
        .bind(&self.company_name)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(&self.email)
        .bind(&self.phone)
        .bind(&self.customer_number)
        .bind(&self.responsible_user_id)
        .fetch_one(pool)
        .await?;

        Ok(party)
    }
}

pub async fn delete_by_weclapp_id(pool: &PgPool, weclapp_id: &str) -> Result<u64, DatabaseError> {
    let result = sqlx::query("DELETE FROM parties WHERE weclapp_id = $1")
        .bind(weclapp_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
