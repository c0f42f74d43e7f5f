//! Role-based permissions and per-data-type visibility scopes.
//!
//! A role is a list of permission strings plus a `DataType -> DataScope` map.
//! System roles are compiled in (see [`roles`]); custom roles live in the
//! `roles` / `role_data_scopes` tables.

pub mod roles;
pub mod scope;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;

use crate::database::{models::role, DatabaseError};

pub const TASKS_READ: &str = "tasks:read";
pub const TASKS_WRITE: &str = "tasks:write";
pub const ORDERS_READ: &str = "orders:read";
pub const PARTIES_READ: &str = "parties:read";
pub const TIME_ENTRIES_READ: &str = "time_entries:read";
pub const USERS_READ: &str = "users:read";
pub const USERS_MANAGE: &str = "users:manage";
pub const INVITATIONS_MANAGE: &str = "invitations:manage";
pub const SYNC_RUN: &str = "sync:run";
pub const WEBHOOKS_READ: &str = "webhooks:read";
pub const DASHBOARD_VIEW: &str = "dashboard:view";

pub const ALL_PERMISSIONS: &[&str] = &[
    TASKS_READ,
    TASKS_WRITE,
    ORDERS_READ,
    PARTIES_READ,
    TIME_ENTRIES_READ,
    USERS_READ,
    USERS_MANAGE,
    INVITATIONS_MANAGE,
    SYNC_RUN,
    WEBHOOKS_READ,
    DASHBOARD_VIEW,
];

pub const ADMIN_ROLE: &str = "admin";

pub fn is_known_permission(permission: &str) -> bool {
    ALL_PERMISSIONS.contains(&permission)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Tasks,
    Orders,
    Parties,
    TimeEntries,
}

impl DataType {
    pub const ALL: [DataType; 4] = [DataType::Tasks, DataType::Orders, DataType::Parties, DataType::TimeEntries];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Tasks => "tasks",
            DataType::Orders => "orders",
            DataType::Parties => "parties",
            DataType::TimeEntries => "time_entries",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        DataType::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    All,
    Own,
    Department,
    Assigned,
    None,
}

impl DataScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataScope::All => "all",
            DataScope::Own => "own",
            DataScope::Department => "department",
            DataScope::Assigned => "assigned",
            DataScope::None => "none",
        }
    }

    /// True when every row visible under `other` is also visible under `self`
    pub fn covers(&self, other: DataScope) -> bool {
        match (self, other) {
            (_, DataScope::None) | (DataScope::All, _) => true,
            // department is matched on the assignee column
            (DataScope::Department, DataScope::Assigned) => true,
            (mine, theirs) => *mine == theirs,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(DataScope::All),
            "own" => Some(DataScope::Own),
            "department" => Some(DataScope::Department),
            "assigned" => Some(DataScope::Assigned),
            "none" => Some(DataScope::None),
            _ => None,
        }
    }
}

/// A role with its permissions and scopes fully materialized
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRole {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub scopes: BTreeMap<DataType, DataScope>,
    pub is_system: bool,
}

impl ResolvedRole {
    /// Role that grants nothing; used for ids that resolve to no role
    pub fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            permissions: vec![],
            scopes: BTreeMap::new(),
            is_system: false,
        }
    }

    pub fn has(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_all(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|p| self.has(p))
    }

    pub fn is_admin(&self) -> bool {
        self.id == ADMIN_ROLE
    }

    /// Whether a holder of this role may give `other` to someone else, or act
    /// on a user who holds it. Only admins hand out admin; everyone else is
    /// limited to roles whose permissions and scopes they already have.
    pub fn can_grant(&self, other: &ResolvedRole) -> bool {
        if self.is_admin() {
            return true;
        }
        if other.is_admin() {
            return false;
        }
        let permissions: Vec<&str> = other.permissions.iter().map(String::as_str).collect();
        self.has_all(&permissions)
            && DataType::ALL.into_iter().all(|t| {
                scope::effective(t, self.scope(t)).covers(scope::effective(t, other.scope(t)))
            })
    }

    pub fn scope(&self, data_type: DataType) -> DataScope {
        self.scopes.get(&data_type).copied().unwrap_or(DataScope::None)
    }

    pub(crate) fn from_row(row: role::RoleRow, scope_rows: Vec<role::RoleDataScopeRow>) -> Self {
        let scopes = scope_rows
            .into_iter()
            .filter_map(|s| Some((DataType::parse(&s.data_type)?, DataScope::parse(&s.scope)?)))
            .collect();
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            permissions: row.permissions.0,
            scopes,
            is_system: row.is_system,
        }
    }
}

/// Look a role up: system table first, then the database
pub async fn find_role(pool: &PgPool, role_id: &str) -> Result<Option<ResolvedRole>, DatabaseError> {
    if let Some(system) = roles::system_role(role_id) {
        return Ok(Some(system));
    }
    let Some(row) = role::find_by_id(pool, role_id).await? else {
        return Ok(None);
    };
    let scope_rows = role::scopes_for(pool, role_id).await?;
    Ok(Some(ResolvedRole::from_row(row, scope_rows)))
}

/// Like [`find_role`], but an unknown id resolves to a role without permissions
pub async fn resolve(pool: &PgPool, role_id: &str) -> Result<ResolvedRole, DatabaseError> {
    Ok(find_role(pool, role_id)
        .await?
        .unwrap_or_else(|| ResolvedRole::empty(role_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_checks() {
        let role = roles::system_role("viewer").unwrap();
        assert!(role.has(TASKS_READ));
        assert!(!role.has(TASKS_WRITE));
        assert!(role.has_all(&[TASKS_READ, ORDERS_READ]));
        assert!(!role.has_all(&[TASKS_WRITE, TASKS_READ]));
        assert!(role.has_all(&[]));
    }

    #[test]
    fn empty_role_sees_nothing() {
        let role = ResolvedRole::empty("ghost");
        for data_type in DataType::ALL {
            assert_eq!(role.scope(data_type), DataScope::None);
        }
        assert!(ALL_PERMISSIONS.iter().all(|p| !role.has(p)));
    }

    #[test]
    fn only_admins_grant_admin() {
        let admin = roles::system_role(ADMIN_ROLE).unwrap();
        let manager = roles::system_role("manager").unwrap();
        let employee = roles::system_role("employee").unwrap();
        let viewer = roles::system_role("viewer").unwrap();

        assert!(admin.can_grant(&admin));
        assert!(admin.can_grant(&manager));
        assert!(!manager.can_grant(&admin));
        assert!(manager.can_grant(&manager));
        assert!(manager.can_grant(&employee));
        assert!(manager.can_grant(&viewer));
        assert!(!employee.can_grant(&admin));
        assert!(!employee.can_grant(&manager));
        // viewer's permissions are a subset of employee's, but its assigned
        // order scope is not covered by employee's own scope
        assert!(!employee.can_grant(&viewer));
    }

    #[test]
    fn grant_needs_every_permission_and_scope() {
        let manager = roles::system_role("manager").unwrap();
        let mut custom = ResolvedRole::empty("support");
        custom.permissions = vec![TASKS_READ.to_string(), USERS_MANAGE.to_string()];
        assert!(!manager.can_grant(&custom));

        custom.permissions = vec![TASKS_READ.to_string()];
        custom.scopes.insert(DataType::Tasks, DataScope::Assigned);
        assert!(manager.can_grant(&custom));

        custom.scopes.insert(DataType::Tasks, DataScope::All);
        assert!(!manager.can_grant(&custom));
    }

    #[test]
    fn scope_coverage() {
        assert!(DataScope::All.covers(DataScope::Own));
        assert!(DataScope::Department.covers(DataScope::Assigned));
        assert!(!DataScope::Department.covers(DataScope::Own));
        assert!(!DataScope::Assigned.covers(DataScope::Department));
        assert!(DataScope::None.covers(DataScope::None));
        assert!(!DataScope::None.covers(DataScope::Own));

        // time entries carry one user column
        assert_eq!(scope::effective(DataType::TimeEntries, DataScope::Own), DataScope::Assigned);
        assert_eq!(scope::effective(DataType::Orders, DataScope::Own), DataScope::Own);
    }

    #[test]
    fn parses_names() {
        assert_eq!(DataType::parse("time_entries"), Some(DataType::TimeEntries));
        assert_eq!(DataType::parse("invoices"), None);
        assert_eq!(DataScope::parse("department"), Some(DataScope::Department));
        assert_eq!(DataScope::parse("everything"), None);
        assert!(is_known_permission("sync:run"));
        assert!(!is_known_permission("sync:*"));
    }

    #[test]
    fn custom_rows_ignore_unknown_scope_entries() {
        let row = role::RoleRow {
            id: "sales".into(),
            name: "Sales".into(),
            description: None,
            permissions: sqlx::types::Json(vec![ORDERS_READ.to_string()]),
            is_system: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let scopes = vec![
            role::RoleDataScopeRow {
                role_id: "sales".into(),
                data_type: "orders".into(),
                scope: "own".into(),
            },
            role::RoleDataScopeRow {
                role_id: "sales".into(),
                data_type: "invoices".into(),
                scope: "all".into(),
            },
        ];
        let resolved = ResolvedRole::from_row(row, scopes);
        assert_eq!(resolved.scope(DataType::Orders), DataScope::Own);
        assert_eq!(resolved.scope(DataType::Tasks), DataScope::None);
        assert_eq!(resolved.scopes.len(), 1);
    }
}
