use std::collections::BTreeMap;

use super::*;

struct SystemRole {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    permissions: &'static [&'static str],
    scopes: [DataScope; 4],
}

// scopes are ordered as DataType::ALL: tasks, orders, parties, time_entries
static SYSTEM_ROLES: &[SystemRole] = &[
    SystemRole {
        id: ADMIN_ROLE,
        name: "Administrator",
        description: "Full access to all data and administration",
        permissions: ALL_PERMISSIONS,
        scopes: [DataScope::All, DataScope::All, DataScope::All, DataScope::All],
    },
    SystemRole {
        id: "manager",
        name: "Manager",
        description: "Manages the team's work and sees all commercial data",
        permissions: &[
            TASKS_READ,
            TASKS_WRITE,
            ORDERS_READ,
            PARTIES_READ,
            TIME_ENTRIES_READ,
            USERS_READ,
            INVITATIONS_MANAGE,
            SYNC_RUN,
            WEBHOOKS_READ,
            DASHBOARD_VIEW,
        ],
        scopes: [DataScope::Department, DataScope::All, DataScope::All, DataScope::Department],
    },
    SystemRole {
        id: "employee",
        name: "Employee",
        description: "Works on assigned tasks and own records",
        permissions: &[TASKS_READ, TASKS_WRITE, ORDERS_READ, PARTIES_READ, TIME_ENTRIES_READ, DASHBOARD_VIEW],
        scopes: [DataScope::Assigned, DataScope::Own, DataScope::Assigned, DataScope::Own],
    },
    SystemRole {
        id: "viewer",
        name: "Viewer",
        description: "Read-only access to assigned records",
        permissions: &[TASKS_READ, ORDERS_READ, PARTIES_READ, DASHBOARD_VIEW],
        scopes: [DataScope::Assigned, DataScope::Assigned, DataScope::Assigned, DataScope::None],
    },
];

impl SystemRole {
    fn resolve(&self) -> ResolvedRole {
        let scopes: BTreeMap<DataType, DataScope> = DataType::ALL
            .into_iter()
            .zip(self.scopes)
            .filter(|(_, scope)| *scope != DataScope::None)
            .collect();
        ResolvedRole {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            permissions: self.permissions.iter().map(|p| p.to_string()).collect(),
            scopes,
            is_system: true,
        }
    }
}

pub fn is_system_role(role_id: &str) -> bool {
    SYSTEM_ROLES.iter().any(|r| r.id == role_id)
}

pub fn system_role(role_id: &str) -> Option<ResolvedRole> {
    SYSTEM_ROLES.iter().find(|r| r.id == role_id).map(SystemRole::resolve)
}

pub fn system_roles() -> Vec<ResolvedRole> {
    SYSTEM_ROLES.iter().map(SystemRole::resolve).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_everything() {
        let admin = system_role(ADMIN_ROLE).unwrap();
        assert!(admin.has_all(ALL_PERMISSIONS));
        for data_type in DataType::ALL {
            assert_eq!(admin.scope(data_type), DataScope::All);
        }
    }

    #[test]
    fn employee_scopes() {
        let employee = system_role("employee").unwrap();
        assert_eq!(employee.scope(DataType::Tasks), DataScope::Assigned);
        assert_eq!(employee.scope(DataType::Orders), DataScope::Own);
        assert!(!employee.has(USERS_MANAGE));
        assert!(employee.is_system);
    }

    #[test]
    fn viewer_has_no_time_entry_scope() {
        let viewer = system_role("viewer").unwrap();
        assert_eq!(viewer.scope(DataType::TimeEntries), DataScope::None);
        assert!(!viewer.scopes.contains_key(&DataType::TimeEntries));
    }

    #[test]
    fn system_role_ids() {
        assert_eq!(system_roles().len(), 4);
        assert!(is_system_role("manager"));
        assert!(!is_system_role("sales"));
        assert!(system_role("sales").is_none());
    }
}
