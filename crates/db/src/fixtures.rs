use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use contractflow_core::domain::tag::{Tag, TagId};
use contractflow_core::domain::user::{User, UserRole};

use crate::repositories::{RepositoryError, TagRepository, UserRepository};

struct DirectoryEntry {
    id: &'static str,
    email: &'static str,
    name: &'static str,
    role: UserRole,
    department: &'static str,
    position: &'static str,
    max_contract_value: Option<i64>,
}

const DIRECTORY: &[DirectoryEntry] = &[
    DirectoryEntry {
        id: "u-1",
        email: "admin@company.com",
        name: "Quản trị viên",
        role: UserRole::Admin,
        department: "IT",
        position: "System Administrator",
        max_contract_value: None,
    },
    DirectoryEntry {
        id: "u-2",
        email: "manager@company.com",
        name: "Trưởng phòng",
        role: UserRole::Manager,
        department: "HR",
        position: "HR Manager",
        max_contract_value: Some(100_000_000),
    },
    DirectoryEntry {
        id: "u-3",
        email: "employee@company.com",
        name: "Nhân viên",
        role: UserRole::Employee,
        department: "Operations",
        position: "Staff",
        max_contract_value: None,
    },
    DirectoryEntry {
        id: "u-4",
        email: "legal@company.com",
        name: "Pháp chế",
        role: UserRole::Legal,
        department: "Legal",
        position: "Legal Counsel",
        max_contract_value: None,
    },
    DirectoryEntry {
        id: "u-5",
        email: "director@company.com",
        name: "Giám đốc",
        role: UserRole::Director,
        department: "Management",
        position: "Director",
        max_contract_value: Some(500_000_000),
    },
    DirectoryEntry {
        id: "u-6",
        email: "finance@company.com",
        name: "Kế toán trưởng",
        role: UserRole::Finance,
        department: "Finance",
        position: "Chief Accountant",
        max_contract_value: None,
    },
    DirectoryEntry {
        id: "u-7",
        email: "ceo@company.com",
        name: "Tổng giám đốc",
        role: UserRole::Ceo,
        department: "Management",
        position: "Chief Executive Officer",
        max_contract_value: None,
    },
];

const TAGS: &[(&str, &str, &str, &str)] = &[
    ("tag-1", "Mua sắm", "blue", "Loại"),
    ("tag-2", "Thiết bị", "green", "Danh mục"),
    ("tag-3", "Dịch vụ", "purple", "Loại"),
    ("tag-4", "IT", "indigo", "Danh mục"),
    ("tag-5", "Nội bộ", "gray", "Phạm vi"),
    ("tag-6", "Đối tác A", "red", "Đối tác"),
];

fn seeded_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default()
}

/// Demo directory covering every role, active and approved.
pub fn seed_directory() -> Vec<User> {
    DIRECTORY
        .iter()
        .map(|entry| {
            let mut user = User::with_role(entry.id, entry.name, entry.email, entry.role);
            user.department = entry.department.to_string();
            user.position = entry.position.to_string();
            user.max_contract_value = entry.max_contract_value.map(Decimal::from);
            user.approved_by = Some("system".to_string());
            user.approved_at = Some(seeded_at());
            user.created_at = seeded_at();
            user
        })
        .collect()
}

pub fn seed_tags() -> Vec<Tag> {
    TAGS.iter()
        .map(|(id, name, color, category)| Tag {
            id: TagId((*id).to_string()),
            name: (*name).to_string(),
            color: (*color).to_string(),
            category: (*category).to_string(),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub users_seeded: usize,
    pub tags_seeded: usize,
}

/// Writes the demo directory and tag catalogue. Existing records with the same ids are replaced.
pub async fn seed<U, T>(users: &U, tags: &T) -> Result<SeedResult, RepositoryError>
where
    U: UserRepository + ?Sized,
    T: TagRepository + ?Sized,
{
    let directory = seed_directory();
    let catalogue = seed_tags();
    let result = SeedResult { users_seeded: directory.len(), tags_seeded: catalogue.len() };

    for user in directory {
        users.save(user).await?;
    }
    for tag in catalogue {
        tags.save(tag).await?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rust_decimal::Decimal;

    use contractflow_core::domain::user::{Permission, UserRole};

    use super::{seed, seed_directory, seed_tags};
    use crate::repositories::{
        InMemoryTagRepository, InMemoryUserRepository, TagRepository, UserRepository,
    };

    #[test]
    fn directory_covers_every_role_once() {
        let users = seed_directory();
        let roles: HashSet<UserRole> = users.iter().map(|user| user.role).collect();

        assert_eq!(users.len(), 7);
        assert_eq!(roles.len(), 7);
        assert!(users.iter().all(|user| user.is_active && user.is_approved));
    }

    #[test]
    fn seeded_limits_and_permissions_follow_the_role() {
        let users = seed_directory();
        let manager = users.iter().find(|user| user.role == UserRole::Manager).expect("manager");
        let employee = users.iter().find(|user| user.role == UserRole::Employee).expect("employee");

        assert_eq!(manager.max_contract_value, Some(Decimal::from(100_000_000)));
        assert_eq!(manager.hierarchy_level, 2);
        assert!(manager.can(Permission::Approve));
        assert!(employee.can(Permission::Upload));
        assert!(!employee.can(Permission::Approve));
    }

    #[tokio::test]
    async fn seed_populates_repositories() {
        let users = InMemoryUserRepository::default();
        let tags = InMemoryTagRepository::default();

        let result = seed(&users, &tags).await.expect("seed");

        assert_eq!(result.users_seeded, 7);
        assert_eq!(result.tags_seeded, seed_tags().len());
        assert_eq!(users.list().await.expect("users").len(), 7);
        assert_eq!(tags.list().await.expect("tags").len(), 6);
    }
}
