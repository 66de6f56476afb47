pub mod fixtures;
pub mod repositories;
pub mod service;

pub use fixtures::{seed, seed_directory, seed_tags, SeedResult};
pub use repositories::{
    CommentRepository, ContractRepository, InMemoryCommentRepository, InMemoryContractRepository,
    InMemoryTagRepository, InMemoryUserRepository, RepositoryError, TagRepository, UserRepository,
};
pub use service::ContractWorkflowService;
