pub mod in_memory_repository;
pub mod postgres_repository;
pub mod postgres_user_repository;

pub use in_memory_repository::{InMemoryRepository, InMemoryUserRepository};
pub use postgres_repository::PostgresRepository;
pub use postgres_user_repository::PostgresUserRepository;
