use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationFailure, WorkflowError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Employee,
    Manager,
    Admin,
    Legal,
    Finance,
    Director,
    Ceo,
}

impl UserRole {
    /// 1: employee, 2: department heads, 3: director, 4: CEO, 5: admin.
    pub fn default_hierarchy_level(self) -> u8 {
        match self {
            Self::Employee => 1,
            Self::Manager | Self::Legal | Self::Finance => 2,
            Self::Director => 3,
            Self::Ceo => 4,
            Self::Admin => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Manager => "manager",
            Self::Admin => "admin",
            Self::Legal => "legal",
            Self::Finance => "finance",
            Self::Director => "director",
            Self::Ceo => "ceo",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employee" => Ok(Self::Employee),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            "legal" => Ok(Self::Legal),
            "finance" => Ok(Self::Finance),
            "director" => Ok(Self::Director),
            "ceo" => Ok(Self::Ceo),
            other => {
                Err(ValidationFailure::UnknownUserRole { value: other.to_string() }.into())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Upload,
    Approve,
    ManageUsers,
    ViewAnalytics,
    Sign,
    ApproveUsers,
    CreateManual,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upload => "can_upload",
            Self::Approve => "can_approve",
            Self::ManageUsers => "can_manage_users",
            Self::ViewAnalytics => "can_view_analytics",
            Self::Sign => "can_sign",
            Self::ApproveUsers => "can_approve_users",
            Self::CreateManual => "can_create_manual",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_upload: bool,
    pub can_approve: bool,
    pub can_manage_users: bool,
    pub can_view_analytics: bool,
    pub can_sign: bool,
    pub can_approve_users: bool,
    pub can_create_manual: bool,
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            can_upload: true,
            can_approve: true,
            can_manage_users: true,
            can_view_analytics: true,
            can_sign: true,
            can_approve_users: true,
            can_create_manual: true,
        }
    }

    pub fn for_role(role: UserRole) -> Self {
        match role {
            UserRole::Admin | UserRole::Director | UserRole::Ceo => Self::all(),
            UserRole::Manager | UserRole::Legal | UserRole::Finance => Self {
                can_upload: true,
                can_approve: true,
                can_view_analytics: true,
                can_sign: true,
                can_create_manual: true,
                ..Self::default()
            },
            UserRole::Employee => Self { can_upload: true, ..Self::default() },
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::Upload => self.can_upload,
            Permission::Approve => self.can_approve,
            Permission::ManageUsers => self.can_manage_users,
            Permission::ViewAnalytics => self.can_view_analytics,
            Permission::Sign => self.can_sign,
            Permission::ApproveUsers => self.can_approve_users,
            Permission::CreateManual => self.can_create_manual,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub department: String,
    pub position: String,
    pub hierarchy_level: u8,
    pub max_contract_value: Option<Decimal>,
    pub is_active: bool,
    pub is_approved: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// An active, approved user with the role's default level and permissions.
    pub fn with_role(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self {
            id: UserId(id.into()),
            email: email.into(),
            name: name.into(),
            role,
            department: String::new(),
            position: String::new(),
            hierarchy_level: role.default_hierarchy_level(),
            max_contract_value: None,
            is_active: true,
            is_approved: true,
            approved_by: None,
            approved_at: None,
            permissions: Permissions::for_role(role),
            created_at: Utc::now(),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.allows(permission)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::{Permission, Permissions, User, UserRole};

    #[test]
    fn employee_defaults_cannot_approve() {
        let employee = User::with_role("u-3", "Nhân viên", "employee@company.com", UserRole::Employee);

        assert_eq!(employee.hierarchy_level, 1);
        assert!(employee.can(Permission::Upload));
        assert!(!employee.can(Permission::Approve));
        assert!(!employee.can(Permission::CreateManual));
    }

    #[test]
    fn department_heads_share_approval_permissions() {
        for role in [UserRole::Manager, UserRole::Legal, UserRole::Finance] {
            let permissions = Permissions::for_role(role);
            assert!(permissions.can_approve, "{role} should approve");
            assert!(!permissions.can_manage_users, "{role} should not manage users");
            assert_eq!(role.default_hierarchy_level(), 2);
        }
    }

    #[test]
    fn role_parsing_is_case_insensitive_and_rejects_unknown_roles() {
        assert_eq!(" Director ".parse::<UserRole>().expect("director"), UserRole::Director);
        assert!("intern".parse::<UserRole>().is_err());
    }
}
