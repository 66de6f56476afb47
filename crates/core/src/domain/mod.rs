pub mod approval;
pub mod contract;
pub mod reminder;
pub mod signature;
pub mod tag;
pub mod user;
pub mod version;
