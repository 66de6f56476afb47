use std::collections::HashMap;

use tokio::sync::RwLock;

use contractflow_core::comments::{CommentId, ContractComment};
use contractflow_core::domain::contract::{Contract, ContractId};
use contractflow_core::domain::tag::{Tag, TagId};
use contractflow_core::domain::user::{User, UserId};

use super::{
    CommentRepository, ContractRepository, RepositoryError, TagRepository, UserRepository,
};

#[derive(Default)]
pub struct InMemoryContractRepository {
    contracts: RwLock<HashMap<String, Contract>>,
}

#[async_trait::async_trait]
impl ContractRepository for InMemoryContractRepository {
    async fn find_by_id(&self, id: &ContractId) -> Result<Option<Contract>, RepositoryError> {
        let contracts = self.contracts.read().await;
        Ok(contracts.get(&id.0).cloned())
    }

    async fn list(&self) -> Result<Vec<Contract>, RepositoryError> {
        let contracts = self.contracts.read().await;
        let mut listed: Vec<Contract> = contracts.values().cloned().collect();
        listed.sort_by(|left, right| {
            left.uploaded_at.cmp(&right.uploaded_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(listed)
    }

    async fn save(&self, contract: Contract) -> Result<(), RepositoryError> {
        let mut contracts = self.contracts.write().await;
        contracts.insert(contract.id.0.clone(), contract);
        Ok(())
    }

    async fn save_if_revision(
        &self,
        mut contract: Contract,
        expected_revision: u64,
    ) -> Result<Contract, RepositoryError> {
        let mut contracts = self.contracts.write().await;
        let actual = contracts.get(&contract.id.0).map_or(0, |stored| stored.revision);
        if actual != expected_revision {
            return Err(RepositoryError::RevisionConflict {
                id: contract.id.0.clone(),
                expected: expected_revision,
                actual,
            });
        }

        contract.revision = expected_revision + 1;
        contracts.insert(contract.id.0.clone(), contract.clone());
        Ok(contract)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut listed: Vec<User> = users.values().cloned().collect();
        listed.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(listed)
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        users.insert(user.id.0.clone(), user);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTagRepository {
    tags: RwLock<HashMap<String, Tag>>,
}

#[async_trait::async_trait]
impl TagRepository for InMemoryTagRepository {
    async fn find_by_id(&self, id: &TagId) -> Result<Option<Tag>, RepositoryError> {
        let tags = self.tags.read().await;
        Ok(tags.get(&id.0).cloned())
    }

    async fn list(&self) -> Result<Vec<Tag>, RepositoryError> {
        let tags = self.tags.read().await;
        let mut listed: Vec<Tag> = tags.values().cloned().collect();
        listed.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(listed)
    }

    async fn save(&self, tag: Tag) -> Result<(), RepositoryError> {
        let mut tags = self.tags.write().await;
        tags.insert(tag.id.0.clone(), tag);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCommentRepository {
    comments: RwLock<HashMap<CommentId, ContractComment>>,
}

#[async_trait::async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn list_for_contract(
        &self,
        contract_id: &ContractId,
    ) -> Result<Vec<ContractComment>, RepositoryError> {
        let comments = self.comments.read().await;
        let mut listed: Vec<ContractComment> = comments
            .values()
            .filter(|comment| &comment.contract_id == contract_id)
            .cloned()
            .collect();
        listed.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(listed)
    }

    async fn save(&self, comment: ContractComment) -> Result<(), RepositoryError> {
        let mut comments = self.comments.write().await;
        comments.insert(comment.id.clone(), comment);
        Ok(())
    }

    async fn delete(&self, id: &CommentId) -> Result<bool, RepositoryError> {
        let mut comments = self.comments.write().await;
        Ok(comments.remove(id).is_some())
    }
}
