// Discord snowflakes are stored as TEXT: SQLite INTEGER is signed 64-bit
// and the ids are u64 on the Rust side.

diesel::table! {
    message_links (id) {
        id -> BigInt,
        telegram_message_id -> Integer,
        telegram_channel_id -> BigInt,
        discord_message_id -> Text,
        discord_channel_id -> Text,
        discord_thread_id -> Nullable<Text>,
        chat_message_id -> Nullable<Integer>,
        created_at -> Text,
        updated_at -> Text,
    }
}
