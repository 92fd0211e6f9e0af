pub mod db;
pub mod entities;
pub mod repository;
pub mod seed;

pub use db::init_db;
pub use repository::{
    ApiKeyStore, AuditStore, ConversationStore, MemoryStore, ProjectStore, QueryLogStore,
    Repository, RepositoryError, SeaOrmRepository, UserStore,
};
