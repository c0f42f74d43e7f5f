use serde_json::Value;

use super::error::FilterError;
use super::types::{ColumnKind, FilterOp, FilterWhereInfo, TableSpec};

/// Compiles a JSON where-object into a parameterized SQL predicate.
///
/// Field keys must be whitelisted columns of the table. Operators are `$`-prefixed
/// keys; a bare value means equality. `$and`/`$or` take arrays, `$not` an object.
pub struct FilterWhere<'a> {
    table: &'a TableSpec,
    param_values: Vec<Value>,
}

impl<'a> FilterWhere<'a> {
    pub fn new(table: &'a TableSpec) -> Self {
        Self {
            table,
            param_values: vec![],
        }
    }

    pub fn generate(
        table: &'a TableSpec,
        where_data: Option<&Value>,
        include_inactive: bool,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(table);
        let mut conditions = vec![];

        if table.soft_scoped && !include_inactive {
            conditions.push("\"is_active\" = TRUE".to_string());
        }
        if let Some(data) = where_data {
            if let Some(sql) = filter_where.parse_group(data)? {
                conditions.push(sql);
            }
        }

        let where_clause = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };
        Ok((where_clause, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_group(&mut self, where_data: &Value) -> Result<Option<String>, FilterError> {
        match where_data {
            Value::Null => Ok(None),
            Value::Object(obj) => {
                let mut parts = vec![];
                for (key, value) in obj {
                    if key.starts_with('$') {
                        parts.push(self.parse_logical_operator(key, value)?);
                    } else {
                        parts.extend(self.parse_field_condition(key, value)?);
                    }
                }
                if parts.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(parts.join(" AND ")))
                }
            }
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    // Empty conjunction is true, empty disjunction is false
                    return Ok(if op == "$and" { "1=1" } else { "1=0" }.to_string());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    let sql = self.parse_group(v)?.unwrap_or_else(|| "1=1".to_string());
                    sql_parts.push(format!("({})", sql));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            "$not" => {
                let sql = self
                    .parse_group(value)?
                    .ok_or_else(|| FilterError::InvalidOperatorData("$not requires a condition".to_string()))?;
                Ok(format!("NOT ({})", sql))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        let kind = self
            .table
            .column(field)
            .ok_or_else(|| FilterError::InvalidColumn(field.to_string()))?;

        let mut out = vec![];
        match value {
            Value::Object(obj) => {
                for (op_key, op_val) in obj {
                    let operator = FilterOp::from_key(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    let info = FilterWhereInfo {
                        column: field.to_string(),
                        kind,
                        operator,
                        data: op_val.clone(),
                    };
                    out.push(self.build_sql_condition(&info)?);
                }
            }
            _ => {
                let info = FilterWhereInfo {
                    column: field.to_string(),
                    kind,
                    operator: FilterOp::Eq,
                    data: value.clone(),
                };
                out.push(self.build_sql_condition(&info)?);
            }
        }
        Ok(out)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", condition.column);
        let kind = condition.kind;

        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() {
                    Ok(format!("{} IS NULL", quoted_column))
                } else {
                    Ok(format!("{} = {}", quoted_column, self.param(kind, &condition.data)?))
                }
            }
            FilterOp::Ne => {
                if condition.data.is_null() {
                    Ok(format!("{} IS NOT NULL", quoted_column))
                } else {
                    Ok(format!("{} IS DISTINCT FROM {}", quoted_column, self.param(kind, &condition.data)?))
                }
            }
            FilterOp::Gt => Ok(format!("{} > {}", quoted_column, self.param(kind, &condition.data)?)),
            FilterOp::Gte => Ok(format!("{} >= {}", quoted_column, self.param(kind, &condition.data)?)),
            FilterOp::Lt => Ok(format!("{} < {}", quoted_column, self.param(kind, &condition.data)?)),
            FilterOp::Lte => Ok(format!("{} <= {}", quoted_column, self.param(kind, &condition.data)?)),
            FilterOp::Like | FilterOp::ILike => {
                if kind != ColumnKind::Text {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "pattern match on non-text column {}",
                        condition.column
                    )));
                }
                let keyword = if condition.operator == FilterOp::Like { "LIKE" } else { "ILIKE" };
                Ok(format!("{} {} {}", quoted_column, keyword, self.param(kind, &condition.data)?))
            }
            FilterOp::In | FilterOp::NIn => {
                let values = match &condition.data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if condition.operator == FilterOp::In { "1=0" } else { "1=1" }.to_string());
                }
                let mut params = Vec::with_capacity(values.len());
                for v in &values {
                    params.push(self.param(kind, v)?);
                }
                let keyword = if condition.operator == FilterOp::In { "IN" } else { "NOT IN" };
                Ok(format!("{} {} ({})", quoted_column, keyword, params.join(", ")))
            }
            FilterOp::Between => match &condition.data {
                Value::Array(values) if values.len() == 2 => {
                    let low = self.param(kind, &values[0])?;
                    let high = self.param(kind, &values[1])?;
                    Ok(format!("{} BETWEEN {} AND {}", quoted_column, low, high))
                }
                _ => Err(FilterError::InvalidOperatorData(
                    "$between requires array with 2 values".to_string(),
                )),
            },
            FilterOp::Null => match condition.data.as_bool() {
                Some(true) => Ok(format!("{} IS NULL", quoted_column)),
                Some(false) => Ok(format!("{} IS NOT NULL", quoted_column)),
                None => Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
        }
    }

    fn param(&mut self, kind: ColumnKind, value: &Value) -> Result<String, FilterError> {
        let coerced = coerce(kind, value)?;
        self.param_values.push(coerced);
        Ok(format!("${}{}", self.param_values.len(), kind.cast()))
    }
}

/// Normalizes a JSON value so it binds with a type Postgres accepts for the column
fn coerce(kind: ColumnKind, value: &Value) -> Result<Value, FilterError> {
    match (kind, value) {
        (_, Value::Null) => Ok(Value::Null),
        (_, Value::Array(_)) | (_, Value::Object(_)) => Err(FilterError::InvalidOperatorData(
            "nested values are not comparable".to_string(),
        )),
        (ColumnKind::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| FilterError::InvalidOperatorData(format!("'{}' is not an integer", s))),
        (ColumnKind::Integer, Value::Bool(_)) => Err(FilterError::InvalidOperatorData(
            "boolean compared to integer column".to_string(),
        )),
        (ColumnKind::Boolean, Value::String(s)) => match s.as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(FilterError::InvalidOperatorData(format!("'{}' is not a boolean", s))),
        },
        (ColumnKind::Boolean, Value::Number(_)) => Err(FilterError::InvalidOperatorData(
            "number compared to boolean column".to_string(),
        )),
        (ColumnKind::Integer, v) | (ColumnKind::Boolean, v) => Ok(v.clone()),
        // Everything else travels as text and is cast in SQL where needed
        (_, Value::String(s)) => Ok(Value::String(s.clone())),
        (_, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (_, Value::Bool(b)) => Ok(Value::String(b.to_string())),
    }
}
