use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use crate::db::schema_sqlite::message_links;

use super::{StoreError, models::MessageLink};

fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime format: {}", e)))
}

fn string_to_snowflake(s: &str) -> Result<u64, StoreError> {
    s.parse()
        .map_err(|e| StoreError::Query(format!("invalid snowflake {s:?}: {e}")))
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = message_links)]
struct DbMessageLink {
    id: i64,
    telegram_message_id: i32,
    telegram_channel_id: i64,
    discord_message_id: String,
    discord_channel_id: String,
    discord_thread_id: Option<String>,
    chat_message_id: Option<i32>,
    created_at: String,
    updated_at: String,
}

impl DbMessageLink {
    fn to_message_link(&self) -> Result<MessageLink, StoreError> {
        Ok(MessageLink {
            id: self.id,
            telegram_message_id: self.telegram_message_id,
            telegram_channel_id: self.telegram_channel_id,
            discord_message_id: string_to_snowflake(&self.discord_message_id)?,
            discord_channel_id: string_to_snowflake(&self.discord_channel_id)?,
            discord_thread_id: self
                .discord_thread_id
                .as_deref()
                .map(string_to_snowflake)
                .transpose()?,
            chat_message_id: self.chat_message_id,
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = message_links)]
struct NewMessageLink {
    telegram_message_id: i32,
    telegram_channel_id: i64,
    discord_message_id: String,
    discord_channel_id: String,
    discord_thread_id: Option<String>,
    chat_message_id: Option<i32>,
    created_at: String,
    updated_at: String,
}

#[derive(AsChangeset)]
#[diesel(table_name = message_links)]
struct UpdateMessageLink {
    discord_thread_id: Option<String>,
    chat_message_id: Option<i32>,
    updated_at: String,
}

fn establish_connection(path: &str) -> Result<SqliteConnection, StoreError> {
    SqliteConnection::establish(path).map_err(|e| StoreError::Connection(e.to_string()))
}

pub struct SqliteLinkStore {
    db_path: Arc<String>,
}

impl SqliteLinkStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::LinkStore for SqliteLinkStore {
    async fn find_by_thread(&self, thread_id: u64) -> Result<Option<MessageLink>, StoreError> {
        let thread_id = thread_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::message_links::dsl::*;
            // In-progress links have a NULL thread id and fall out of the
            // equality filter by themselves.
            message_links
                .filter(discord_thread_id.eq(thread_id))
                .select(DbMessageLink::as_select())
                .first::<DbMessageLink>(&mut conn)
                .optional()
                .map_err(|e| StoreError::Query(e.to_string()))?
                .map(|m| m.to_message_link())
                .transpose()
        })
        .await
        .map_err(|e| StoreError::Query(format!("database task failed: {e}")))?
    }

    async fn find_by_telegram_message_id(
        &self,
        telegram_message_id_param: i32,
    ) -> Result<Option<MessageLink>, StoreError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::message_links::dsl::*;
            message_links
                .filter(telegram_message_id.eq(telegram_message_id_param))
                .select(DbMessageLink::as_select())
                .first::<DbMessageLink>(&mut conn)
                .optional()
                .map_err(|e| StoreError::Query(e.to_string()))?
                .map(|m| m.to_message_link())
                .transpose()
        })
        .await
        .map_err(|e| StoreError::Query(format!("database task failed: {e}")))?
    }

    async fn find_by_forwarded_id(
        &self,
        original_message_id: i32,
    ) -> Result<Option<MessageLink>, StoreError> {
        // A forward-origin reference names the message id the post had in its
        // channel, which is exactly the key the link was created under.
        self.find_by_telegram_message_id(original_message_id).await
    }

    async fn create(&self, link: &MessageLink) -> Result<MessageLink, StoreError> {
        let link = link.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::message_links::dsl::*;

            let existing = message_links
                .filter(telegram_message_id.eq(link.telegram_message_id))
                .select(DbMessageLink::as_select())
                .first::<DbMessageLink>(&mut conn)
                .optional()
                .map_err(|e| StoreError::Query(e.to_string()))?;
            if existing.is_some() {
                return Err(StoreError::DuplicateLink(link.telegram_message_id));
            }

            let new_link = NewMessageLink {
                telegram_message_id: link.telegram_message_id,
                telegram_channel_id: link.telegram_channel_id,
                discord_message_id: link.discord_message_id.to_string(),
                discord_channel_id: link.discord_channel_id.to_string(),
                discord_thread_id: link.discord_thread_id.map(|t| t.to_string()),
                chat_message_id: link.chat_message_id,
                created_at: datetime_to_string(&link.created_at),
                updated_at: datetime_to_string(&link.updated_at),
            };

            diesel::insert_into(message_links)
                .values(&new_link)
                .execute(&mut conn)
                .map_err(|e| StoreError::Query(e.to_string()))?;

            message_links
                .filter(telegram_message_id.eq(link.telegram_message_id))
                .select(DbMessageLink::as_select())
                .first::<DbMessageLink>(&mut conn)
                .map_err(|e| StoreError::Query(e.to_string()))?
                .to_message_link()
        })
        .await
        .map_err(|e| StoreError::Query(format!("database task failed: {e}")))?
    }

    async fn update(&self, link: &MessageLink) -> Result<(), StoreError> {
        let link = link.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let changes = UpdateMessageLink {
                discord_thread_id: link.discord_thread_id.map(|t| t.to_string()),
                chat_message_id: link.chat_message_id,
                updated_at: datetime_to_string(&Utc::now()),
            };

            let affected =
                diesel::update(message_links::table.filter(message_links::id.eq(link.id)))
                    .set(changes)
                    .execute(&mut conn)
                    .map_err(|e| StoreError::Query(e.to_string()))?;

            if affected == 0 {
                Err(StoreError::NotFound(link.id))
            } else {
                Ok(())
            }
        })
        .await
        .map_err(|e| StoreError::Query(format!("database task failed: {e}")))?
    }
}
