use serde_json::{json, Value};
use sqlx::PgPool;

use super::{DataScope, DataType, ResolvedRole};
use crate::database::{
    models::{user, User},
    DatabaseError,
};

/// Visibility restriction for one query
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeCondition {
    Unrestricted,
    Where(Value),
    Nothing,
}

impl ScopeCondition {
    /// Where-object for the filter layer; `None` means no restriction
    pub fn to_where(&self) -> Option<Value> {
        match self {
            ScopeCondition::Unrestricted => None,
            ScopeCondition::Where(value) => Some(value.clone()),
            // empty $or compiles to 1=0
            ScopeCondition::Nothing => Some(json!({ "$or": [] })),
        }
    }
}

/// (owner column, assignee column) holding WeClapp user ids
pub fn scope_columns(data_type: DataType) -> (&'static str, &'static str) {
    match data_type {
        DataType::Tasks => ("creator_user_id", "assignee_user_id"),
        DataType::Orders => ("created_by_user_id", "responsible_user_id"),
        DataType::Parties => ("responsible_user_id", "responsible_user_id"),
        DataType::TimeEntries => ("user_id", "user_id"),
    }
}

/// Own and assigned select the same rows when one column serves as both
pub fn effective(data_type: DataType, scope: DataScope) -> DataScope {
    let (owner, assignee) = scope_columns(data_type);
    if scope == DataScope::Own && owner == assignee {
        DataScope::Assigned
    } else {
        scope
    }
}

/// Build the condition without touching the database. `department_ids` are the
/// WeClapp ids of the user's department and only matter for the department scope.
pub fn condition(
    data_type: DataType,
    scope: DataScope,
    weclapp_user_id: Option<&str>,
    department_ids: Option<&[String]>,
) -> ScopeCondition {
    let (owner, assignee) = scope_columns(data_type);
    if scope == DataScope::All {
        return ScopeCondition::Unrestricted;
    }
    let Some(weclapp_id) = weclapp_user_id else {
        return ScopeCondition::Nothing;
    };
    match scope {
        DataScope::Own => ScopeCondition::Where(json!({ owner: weclapp_id })),
        DataScope::Assigned => ScopeCondition::Where(json!({ assignee: weclapp_id })),
        DataScope::Department => match department_ids {
            Some(ids) if !ids.is_empty() => ScopeCondition::Where(json!({ assignee: { "$in": ids } })),
            _ => ScopeCondition::Nothing,
        },
        DataScope::All | DataScope::None => ScopeCondition::Nothing,
    }
}

/// Resolve the condition for `user`, loading department members when needed
pub async fn condition_for(
    pool: &PgPool,
    user: &User,
    role: &ResolvedRole,
    data_type: DataType,
) -> Result<ScopeCondition, DatabaseError> {
    let scope = role.scope(data_type);
    let department_ids = match (scope, user.department.as_deref(), user.weclapp_user_id.as_deref()) {
        (DataScope::Department, Some(department), Some(_)) => {
            Some(user::weclapp_ids_in_department(pool, department).await?)
        }
        _ => None,
    };
    Ok(condition(
        data_type,
        scope,
        user.weclapp_user_id.as_deref(),
        department_ids.as_deref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_scope_is_unrestricted_even_without_link() {
        assert_eq!(condition(DataType::Orders, DataScope::All, None, None), ScopeCondition::Unrestricted);
        assert_eq!(ScopeCondition::Unrestricted.to_where(), None);
    }

    #[test]
    fn own_and_assigned_use_entity_columns() {
        assert_eq!(
            condition(DataType::Tasks, DataScope::Own, Some("u1"), None),
            ScopeCondition::Where(json!({"creator_user_id": "u1"}))
        );
        assert_eq!(
            condition(DataType::Tasks, DataScope::Assigned, Some("u1"), None),
            ScopeCondition::Where(json!({"assignee_user_id": "u1"}))
        );
        assert_eq!(
            condition(DataType::Orders, DataScope::Own, Some("u1"), None),
            ScopeCondition::Where(json!({"created_by_user_id": "u1"}))
        );
        assert_eq!(
            condition(DataType::TimeEntries, DataScope::Assigned, Some("u1"), None),
            ScopeCondition::Where(json!({"user_id": "u1"}))
        );
    }

    #[test]
    fn department_needs_members() {
        let ids = vec!["u1".to_string(), "u2".to_string()];
        assert_eq!(
            condition(DataType::Parties, DataScope::Department, Some("u1"), Some(&ids)),
            ScopeCondition::Where(json!({"responsible_user_id": {"$in": ["u1", "u2"]}}))
        );
        assert_eq!(
            condition(DataType::Parties, DataScope::Department, Some("u1"), None),
            ScopeCondition::Nothing
        );
    }

    #[test]
    fn unlinked_users_and_none_scope_see_nothing() {
        assert_eq!(condition(DataType::Tasks, DataScope::Own, None, None), ScopeCondition::Nothing);
        assert_eq!(condition(DataType::Tasks, DataScope::None, Some("u1"), None), ScopeCondition::Nothing);
        assert_eq!(ScopeCondition::Nothing.to_where(), Some(json!({"$or": []})));
    }
}
