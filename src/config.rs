pub use self::parser::{Config, DatabaseConfig, DiscordConfig, LoggingConfig, TelegramConfig};
pub use self::validator::ConfigError;

mod parser;
mod validator;
