use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::approval::ApprovalStep;
use crate::domain::user::{Permission, Permissions, User, UserId, UserRole};
use crate::errors::{AuthorizationFailure, ValidationFailure, WorkflowError};

/// Self-service sign-up; the account waits for an administrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub department: String,
    pub position: String,
}

pub fn register_user(
    registration: Registration,
    now: DateTime<Utc>,
) -> Result<User, WorkflowError> {
    let email = registration.email.trim().to_string();
    if !is_plausible_email(&email) {
        return Err(ValidationFailure::InvalidEmail { value: email }.into());
    }
    let name = registration.name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationFailure::EmptyField { field: "name" }.into());
    }

    let role = UserRole::Employee;
    Ok(User {
        id: UserId(format!("u-{}", Uuid::new_v4())),
        email,
        name,
        role,
        department: registration.department,
        position: registration.position,
        hierarchy_level: role.default_hierarchy_level(),
        max_contract_value: None,
        is_active: true,
        is_approved: false,
        approved_by: None,
        approved_at: None,
        permissions: Permissions { can_upload: true, ..Permissions::default() },
        created_at: now,
    })
}

pub fn approve_user(
    target: &mut User,
    approver: &User,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    ensure_active(approver)?;
    if !approver.can(Permission::ApproveUsers) {
        return Err(AuthorizationFailure::MissingPermission {
            user_id: approver.id.0.clone(),
            permission: Permission::ApproveUsers,
        }
        .into());
    }

    target.is_approved = true;
    target.approved_by = Some(approver.name.clone());
    target.approved_at = Some(now);
    Ok(())
}

/// Moves a user to a new role with that role's default level and permissions.
pub fn assign_role(target: &mut User, role: UserRole, actor: &User) -> Result<(), WorkflowError> {
    ensure_active(actor)?;
    if !actor.can(Permission::ManageUsers) {
        return Err(AuthorizationFailure::MissingPermission {
            user_id: actor.id.0.clone(),
            permission: Permission::ManageUsers,
        }
        .into());
    }

    target.role = role;
    target.hierarchy_level = role.default_hierarchy_level();
    target.permissions = Permissions::for_role(role);
    Ok(())
}

/// A user may resolve a step when active, approved, allowed to approve, and
/// either senior enough or holding the step's own role.
pub fn authorize_step(user: &User, step: &ApprovalStep) -> Result<(), AuthorizationFailure> {
    ensure_active(user)?;
    if !user.can(Permission::Approve) {
        return Err(AuthorizationFailure::MissingPermission {
            user_id: user.id.0.clone(),
            permission: Permission::Approve,
        });
    }

    let role_matches = user.role == step.approver_role.intended_user_role();
    if user.hierarchy_level < step.required_hierarchy_level && !role_matches {
        return Err(AuthorizationFailure::InsufficientHierarchyLevel {
            user_id: user.id.0.clone(),
            actual: user.hierarchy_level,
            required: step.required_hierarchy_level,
        });
    }

    Ok(())
}

/// Users eligible for `step`, most junior first.
pub fn available_approvers<'a>(step: &ApprovalStep, users: &'a [User]) -> Vec<&'a User> {
    let mut eligible: Vec<&User> =
        users.iter().filter(|user| authorize_step(user, step).is_ok()).collect();
    eligible.sort_by(|left, right| {
        left.hierarchy_level.cmp(&right.hierarchy_level).then_with(|| left.id.cmp(&right.id))
    });
    eligible
}

fn ensure_active(user: &User) -> Result<(), AuthorizationFailure> {
    if !user.is_active {
        return Err(AuthorizationFailure::InactiveUser { user_id: user.id.0.clone() });
    }
    if !user.is_approved {
        return Err(AuthorizationFailure::UnapprovedUser { user_id: user.id.0.clone() });
    }
    Ok(())
}

fn is_plausible_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{approve_user, assign_role, authorize_step, available_approvers, register_user, Registration};
    use crate::domain::approval::{ApprovalStep, ApproverRole};
    use crate::domain::user::{User, UserRole};
    use crate::errors::{AuthorizationFailure, ValidationFailure, WorkflowError};

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            name: "Phạm Thị D".to_string(),
            department: "Kinh doanh".to_string(),
            position: "Chuyên viên".to_string(),
        }
    }

    fn admin() -> User {
        User::with_role("u-1", "Quản trị viên", "admin@company.com", UserRole::Admin)
    }

    #[test]
    fn registration_creates_an_unapproved_employee() {
        let user = register_user(registration("d@company.com"), Utc::now()).expect("register");

        assert_eq!(user.role, UserRole::Employee);
        assert_eq!(user.hierarchy_level, 1);
        assert!(user.is_active);
        assert!(!user.is_approved);
        assert!(user.permissions.can_upload);
        assert!(!user.permissions.can_approve);
    }

    #[test]
    fn registration_rejects_malformed_email() {
        let error = register_user(registration("not-an-email"), Utc::now()).expect_err("bad email");
        assert!(matches!(error, WorkflowError::Validation(ValidationFailure::InvalidEmail { .. })));
    }

    #[test]
    fn only_user_approvers_can_approve_accounts() {
        let mut pending = register_user(registration("d@company.com"), Utc::now()).expect("register");
        let manager = User::with_role("u-2", "Trưởng phòng", "manager@company.com", UserRole::Manager);

        let error = approve_user(&mut pending, &manager, Utc::now()).expect_err("manager cannot");
        assert!(matches!(
            error,
            WorkflowError::Authorization(AuthorizationFailure::MissingPermission { .. })
        ));
        assert!(!pending.is_approved);

        approve_user(&mut pending, &admin(), Utc::now()).expect("admin approves");
        assert!(pending.is_approved);
        assert_eq!(pending.approved_by.as_deref(), Some("Quản trị viên"));
    }

    #[test]
    fn role_assignment_resets_level_and_permissions() {
        let mut user = User::with_role("u-3", "Nhân viên", "employee@company.com", UserRole::Employee);
        assign_role(&mut user, UserRole::Legal, &admin()).expect("assign");

        assert_eq!(user.hierarchy_level, 2);
        assert!(user.permissions.can_approve);
    }

    #[test]
    fn unapproved_or_inactive_users_cannot_resolve_steps() {
        let step = ApprovalStep::pending(1, ApproverRole::Manager, 2, None);
        let mut manager = User::with_role("u-2", "Trưởng phòng", "manager@company.com", UserRole::Manager);

        manager.is_approved = false;
        assert!(matches!(
            authorize_step(&manager, &step),
            Err(AuthorizationFailure::UnapprovedUser { .. })
        ));

        manager.is_approved = true;
        manager.is_active = false;
        assert!(matches!(
            authorize_step(&manager, &step),
            Err(AuthorizationFailure::InactiveUser { .. })
        ));
    }

    #[test]
    fn available_approvers_are_sorted_by_level_then_id() {
        let step = ApprovalStep::pending(1, ApproverRole::Legal, 2, None);
        let users = vec![
            User::with_role("u-5", "Giám đốc", "director@company.com", UserRole::Director),
            User::with_role("u-4", "Pháp chế", "legal@company.com", UserRole::Legal),
            User::with_role("u-3", "Nhân viên", "employee@company.com", UserRole::Employee),
            User::with_role("u-2", "Trưởng phòng", "manager@company.com", UserRole::Manager),
        ];

        let ids: Vec<&str> =
            available_approvers(&step, &users).iter().map(|user| user.id.0.as_str()).collect();

        assert_eq!(ids, vec!["u-2", "u-4", "u-5"]);
    }

    #[test]
    fn ceo_step_is_open_to_the_ceo_and_admins_only() {
        let step = ApprovalStep::pending(5, ApproverRole::Ceo, 4, None);
        let users = vec![
            admin(),
            User::with_role("u-5", "Giám đốc", "director@company.com", UserRole::Director),
            User::with_role("u-7", "Tổng giám đốc", "ceo@company.com", UserRole::Ceo),
        ];

        let ids: Vec<&str> =
            available_approvers(&step, &users).iter().map(|user| user.id.0.as_str()).collect();

        assert_eq!(ids, vec!["u-7", "u-1"]);
    }
}
