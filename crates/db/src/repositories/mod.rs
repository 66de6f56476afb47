use async_trait::async_trait;
use thiserror::Error;

use contractflow_core::comments::{CommentId, ContractComment};
use contractflow_core::domain::contract::{Contract, ContractId};
use contractflow_core::domain::tag::{Tag, TagId};
use contractflow_core::domain::user::{User, UserId};

pub mod memory;

pub use memory::{
    InMemoryCommentRepository, InMemoryContractRepository, InMemoryTagRepository,
    InMemoryUserRepository,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("contract `{id}` is at revision {actual}, expected {expected}")]
    RevisionConflict { id: String, expected: u64, actual: u64 },
    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn find_by_id(&self, id: &ContractId) -> Result<Option<Contract>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Contract>, RepositoryError>;
    async fn save(&self, contract: Contract) -> Result<(), RepositoryError>;

    /// Stores `contract` only if the stored copy is still at `expected_revision`
    /// (absent counts as revision 0). The stored revision becomes `expected_revision + 1`.
    async fn save_if_revision(
        &self,
        contract: Contract,
        expected_revision: u64,
    ) -> Result<Contract, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn find_by_id(&self, id: &TagId) -> Result<Option<Tag>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Tag>, RepositoryError>;
    async fn save(&self, tag: Tag) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn list_for_contract(
        &self,
        contract_id: &ContractId,
    ) -> Result<Vec<ContractComment>, RepositoryError>;
    async fn save(&self, comment: ContractComment) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &CommentId) -> Result<bool, RepositoryError>;
}
