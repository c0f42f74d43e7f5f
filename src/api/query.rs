use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::filter::{FilterData, TableSpec};

/// Query string shared by every list route:
/// `?search=&status=&from=&to=&sort=col desc&limit=&offset=&include_inactive=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub include_inactive: Option<bool>,
}

impl ListQuery {
    /// Effective (limit, offset): default page size when absent, capped at the maximum
    pub fn page(&self, api: &ApiConfig) -> Result<(i64, i64), ApiError> {
        let limit = match self.limit {
            None => api.default_page_size,
            Some(l) if l < 1 => return Err(ApiError::field_error("limit", "must be at least 1")),
            Some(l) => l.min(api.max_page_size),
        };
        let offset = match self.offset {
            None => 0,
            Some(o) if o < 0 => return Err(ApiError::field_error("offset", "must not be negative")),
            Some(o) => o,
        };
        Ok((limit, offset))
    }

    /// Builds the filter for one paged select. `date_column` receives the
    /// from/to range; `extra` holds entity-specific conditions; `scope` is the
    /// caller's visibility restriction.
    pub fn to_filter(
        &self,
        table: &TableSpec,
        date_column: Option<&str>,
        extra: Vec<Value>,
        scope: Option<Value>,
        api: &ApiConfig,
    ) -> Result<FilterData, ApiError> {
        let (limit, offset) = self.page(api)?;
        let mut conditions = extra;

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            let alternatives: Vec<Value> = table
                .search_columns
                .iter()
                .map(|column| json!({ *column: { "$ilike": pattern } }))
                .collect();
            conditions.push(json!({ "$or": alternatives }));
        }

        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            if table.column("status").is_none() {
                return Err(ApiError::field_error("status", format!("{} cannot be filtered by status", table.name)));
            }
            conditions.push(json!({ "status": status }));
        }

        if self.from.is_some() || self.to.is_some() {
            let column = date_column.ok_or_else(|| {
                ApiError::bad_request(format!("{} does not support date ranges", table.name))
            })?;
            let mut range = serde_json::Map::new();
            if let Some(from) = self.from.as_deref() {
                range.insert("$gte".into(), json!(parse_date(from, false, "from")?.to_rfc3339()));
            }
            if let Some(to) = self.to.as_deref() {
                range.insert("$lte".into(), json!(parse_date(to, true, "to")?.to_rfc3339()));
            }
            conditions.push(json!({ column: Value::Object(range) }));
        }

        if let Some(scope) = scope {
            conditions.push(scope);
        }

        Ok(FilterData {
            where_clause: if conditions.is_empty() {
                None
            } else {
                Some(json!({ "$and": conditions }))
            },
            order: self.sort.as_deref().filter(|s| !s.trim().is_empty()).map(parse_sort).transpose()?,
            limit: Some(limit),
            offset: Some(offset),
            include_inactive: self.include_inactive.unwrap_or(false),
        })
    }
}

/// Equality condition for an optional query parameter
pub fn eq_filter<T: Serialize>(column: &str, value: Option<T>) -> Option<Value> {
    value.map(|v| json!({ column: v }))
}

/// `col` or `col desc`; a leading `-` also means descending
fn parse_sort(raw: &str) -> Result<Value, ApiError> {
    let mut parts = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut words = item.split_whitespace();
        let column = words.next().unwrap_or_default();
        let direction = words.next().unwrap_or("asc");
        if words.next().is_some() || !matches!(direction.to_ascii_lowercase().as_str(), "asc" | "desc") {
            return Err(ApiError::field_error("sort", format!("cannot parse '{}'", item)));
        }
        let (column, direction) = match column.strip_prefix('-') {
            Some(stripped) => (stripped, "desc"),
            None => (column, direction),
        };
        parts.push(format!("{} {}", column, direction.to_ascii_lowercase()));
    }
    Ok(Value::String(parts.join(", ")))
}

/// RFC 3339 timestamp or a plain date. A plain `to` date covers the whole day.
fn parse_date(raw: &str, end_of_day: bool, field: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::field_error(field, "must be RFC 3339 or YYYY-MM-DD"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .unwrap_or_default();
    Ok(date.and_time(time).and_utc())
}

fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::filter::ColumnKind;

    static NOTES: TableSpec = TableSpec {
        name: "notes",
        columns: &[
            ("title", ColumnKind::Text),
            ("body", ColumnKind::Text),
            ("status", ColumnKind::Text),
            ("written_at", ColumnKind::Timestamp),
        ],
        search_columns: &["title", "body"],
        soft_scoped: true,
        default_order: "written_at desc",
    };

    fn api() -> ApiConfig {
        AppConfig::development().api
    }

    #[test]
    fn paging_defaults_and_caps() {
        let query = ListQuery::default();
        assert_eq!(query.page(&api()).unwrap(), (25, 0));

        let query = ListQuery {
            limit: Some(10_000),
            offset: Some(50),
            ..Default::default()
        };
        assert_eq!(query.page(&api()).unwrap(), (500, 50));

        let query = ListQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert!(query.page(&api()).is_err());
    }

    #[test]
    fn search_status_and_scope_are_and_ed() {
        let query = ListQuery {
            search: Some("50%".into()),
            status: Some("OPEN".into()),
            ..Default::default()
        };
        let filter = query
            .to_filter(&NOTES, None, vec![], Some(json!({"owner": "7"})), &api())
            .unwrap();
        assert_eq!(
            filter.where_clause,
            Some(json!({"$and": [
                {"$or": [{"title": {"$ilike": "%50\\%%"}}, {"body": {"$ilike": "%50\\%%"}}]},
                {"status": "OPEN"},
                {"owner": "7"},
            ]}))
        );
        assert_eq!(filter.limit, Some(25));
        assert!(!filter.include_inactive);
    }

    #[test]
    fn date_range_accepts_plain_dates() {
        let query = ListQuery {
            from: Some("2024-03-01".into()),
            to: Some("2024-03-31".into()),
            ..Default::default()
        };
        let filter = query.to_filter(&NOTES, Some("written_at"), vec![], None, &api()).unwrap();
        let range = &filter.where_clause.unwrap()["$and"][0]["written_at"];
        assert_eq!(range["$gte"], json!("2024-03-01T00:00:00+00:00"));
        assert_eq!(range["$lte"], json!("2024-03-31T23:59:59.999+00:00"));
    }

    #[test]
    fn date_range_needs_a_column() {
        let query = ListQuery {
            from: Some("2024-03-01".into()),
            ..Default::default()
        };
        assert!(query.to_filter(&NOTES, None, vec![], None, &api()).is_err());

        let query = ListQuery {
            to: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(query.to_filter(&NOTES, Some("written_at"), vec![], None, &api()).is_err());
    }

    #[test]
    fn sort_forms() {
        assert_eq!(parse_sort("title").unwrap(), json!("title asc"));
        assert_eq!(parse_sort("title DESC, body").unwrap(), json!("title desc, body asc"));
        assert_eq!(parse_sort("-written_at").unwrap(), json!("written_at desc"));
        assert!(parse_sort("title sideways").is_err());
    }

    #[test]
    fn eq_filter_skips_absent_values() {
        assert_eq!(eq_filter("task_id", Some("9")), Some(json!({"task_id": "9"})));
        assert_eq!(eq_filter::<bool>("billable", None), None);
    }
}
