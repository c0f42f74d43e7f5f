use serde_json::json;
use sqlx::{self, postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::{FilterData, TableSpec};

/// Read side over one whitelisted table
pub struct Repository<T> {
    table: &'static TableSpec,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin,
{
    pub fn new(table: &'static TableSpec, pool: PgPool) -> Self {
        Self {
            table,
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        QueryBuilder::<T>::new(self.table)
            .filter(filter_data)?
            .select_all(&self.pool)
            .await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        QueryBuilder::<T>::new(self.table)
            .filter(filter_data)?
            .select_optional(&self.pool)
            .await
    }

    pub async fn select_404(&self, filter_data: FilterData) -> Result<T, DatabaseError> {
        self.select_one(filter_data)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} record not found", self.table.name)))
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        QueryBuilder::<T>::new(self.table)
            .filter(filter_data)?
            .count(&self.pool)
            .await
    }

    /// Paged fetch plus total count under the same conditions
    pub async fn select_page(&self, filter_data: FilterData) -> Result<(Vec<T>, i64), DatabaseError> {
        let count_filter = FilterData {
            where_clause: filter_data.where_clause.clone(),
            include_inactive: filter_data.include_inactive,
            ..Default::default()
        };
        let rows = self.select_any(filter_data).await?;
        let total = self.count(count_filter).await?;
        Ok((rows, total))
    }

    /// Fetch by local id, additionally constrained by `scope` (a where-object)
    pub async fn select_id(&self, id: Uuid, scope: Option<serde_json::Value>) -> Result<T, DatabaseError> {
        let mut conditions = vec![json!({ "id": id.to_string() })];
        if let Some(scope) = scope {
            conditions.push(scope);
        }
        self.select_404(FilterData {
            where_clause: Some(json!({ "$and": conditions })),
            include_inactive: true,
            ..Default::default()
        })
        .await
    }
}
