use std::sync::Arc;

use diesel::Connection;
use diesel::RunQueryDsl;
use diesel::sqlite::SqliteConnection;

use crate::db::sqlite::SqliteLinkStore;
use crate::db::{LinkStore, StoreError};

/// Owns the SQLite file backing the mapping store. The file is created on
/// first connection; `migrate` brings the schema up at startup.
#[derive(Clone)]
pub struct DatabaseManager {
    db_path: String,
    link_store: Arc<dyn LinkStore>,
}

impl DatabaseManager {
    pub fn new(db_path: &str) -> Self {
        let path = Arc::new(db_path.to_string());
        Self {
            db_path: db_path.to_string(),
            link_store: Arc::new(SqliteLinkStore::new(path)),
        }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = SqliteConnection::establish(&path)
                .map_err(|e| StoreError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS message_links (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    telegram_message_id INTEGER NOT NULL UNIQUE,
                    telegram_channel_id BIGINT NOT NULL,
                    discord_message_id TEXT NOT NULL,
                    discord_channel_id TEXT NOT NULL,
                    discord_thread_id TEXT,
                    chat_message_id INTEGER,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_message_links_telegram_id ON message_links(telegram_message_id)",
                "CREATE INDEX IF NOT EXISTS idx_message_links_thread_id ON message_links(discord_thread_id)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| StoreError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| StoreError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn link_store(&self) -> Arc<dyn LinkStore> {
        self.link_store.clone()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::DatabaseManager;
    use crate::db::{MessageLink, StoreError};

    async fn manager() -> (DatabaseManager, NamedTempFile) {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = DatabaseManager::new(&file.path().to_string_lossy());
        manager.migrate().await.expect("migrate");
        (manager, file)
    }

    #[tokio::test]
    async fn link_roundtrip_and_duplicate_rejection() {
        let (manager, _file) = manager().await;
        let store = manager.link_store();

        let link = MessageLink::new(42, -1001234, 900100, 800100, Some(700100));
        let created = store.create(&link).await.expect("create link");
        assert!(created.id > 0);
        assert_eq!(created.telegram_message_id, 42);
        assert_eq!(created.discord_thread_id, Some(700100));
        assert!(created.chat_message_id.is_none());

        match store.create(&link).await {
            Err(StoreError::DuplicateLink(42)) => {}
            other => panic!("expected DuplicateLink, got {other:?}"),
        }

        let by_telegram = store
            .find_by_telegram_message_id(42)
            .await
            .expect("query")
            .expect("link exists");
        assert_eq!(by_telegram.discord_message_id, 900100);

        let by_forward = store
            .find_by_forwarded_id(42)
            .await
            .expect("query")
            .expect("link exists");
        assert_eq!(by_forward.id, by_telegram.id);

        let by_thread = store
            .find_by_thread(700100)
            .await
            .expect("query")
            .expect("link exists");
        assert_eq!(by_thread.telegram_message_id, 42);
    }

    #[tokio::test]
    async fn update_populates_chat_message_id_and_persists() {
        let (manager, file) = manager().await;
        let store = manager.link_store();

        let mut created = store
            .create(&MessageLink::new(7, -1001234, 901, 801, Some(701)))
            .await
            .expect("create link");

        created.chat_message_id = Some(55);
        store.update(&created).await.expect("update link");

        // Reopen to prove the mutation landed on disk.
        let reopened = DatabaseManager::new(&file.path().to_string_lossy());
        let after = reopened
            .link_store()
            .find_by_telegram_message_id(7)
            .await
            .expect("query after reopen")
            .expect("link exists after reopen");
        assert_eq!(after.chat_message_id, Some(55));
    }

    #[tokio::test]
    async fn update_of_missing_row_reports_not_found() {
        let (manager, _file) = manager().await;
        let store = manager.link_store();

        let mut phantom = MessageLink::new(9, -1001234, 902, 802, None);
        phantom.id = 9999;
        match store.update(&phantom).await {
            Err(StoreError::NotFound(9999)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn in_progress_links_are_invisible_to_thread_lookup() {
        let (manager, _file) = manager().await;
        let store = manager.link_store();

        store
            .create(&MessageLink::new(11, -1001234, 903, 803, None))
            .await
            .expect("create in-progress link");

        let found = store.find_by_thread(0).await.expect("query");
        assert!(found.is_none());
    }
}
