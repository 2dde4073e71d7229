pub use self::error::StoreError;
pub use self::manager::DatabaseManager;
pub use self::models::MessageLink;
pub use self::stores::LinkStore;

pub mod error;
pub mod manager;
pub mod models;
pub mod schema_sqlite;
pub mod sqlite;
pub mod stores;
