// 駆動される側アダプター（リポジトリ実装・認証基盤）

mod argon2_password_hasher;
mod book_repository;
mod category_repository;
mod in_memory_store;
mod jwt_identity_provider;
mod mysql_rows;
mod order_repository;
mod user_repository;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use book_repository::MySqlBookRepository;
pub use category_repository::MySqlCategoryRepository;
pub use in_memory_store::InMemoryStore;
pub use jwt_identity_provider::JwtIdentityProvider;
pub use order_repository::{MySqlLedgerTransaction, MySqlOrderRepository};
pub use user_repository::MySqlUserRepository;
