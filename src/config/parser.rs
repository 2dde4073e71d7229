use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Channel that receives the mirrored posts.
    #[serde(default)]
    pub post_channel_id: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_file")]
    pub filename: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            filename: default_database_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the YAML file named by CONFIG_PATH (default config.yaml).
    /// A missing file is fine; the environment can supply everything.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::parse_file(&config_path)?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "telegram.bot_token cannot be empty".to_string(),
            ));
        }

        if self.discord.bot_token.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "discord.bot_token cannot be empty".to_string(),
            ));
        }

        if self.discord.post_channel_id == 0 {
            return Err(ConfigError::InvalidConfig(
                "discord.post_channel_id cannot be zero".to_string(),
            ));
        }

        if self.database.filename.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database.filename cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("TG_TOKEN") {
            self.telegram.bot_token = value;
        }
        if let Ok(value) = std::env::var("DISCORD_TOKEN") {
            self.discord.bot_token = value;
        }
        if let Ok(value) = std::env::var("POST_CHANNEL_ID") {
            if let Ok(id) = value.parse() {
                self.discord.post_channel_id = id;
            }
        }
        if let Ok(value) = std::env::var("DATABASE_FILE") {
            self.database.filename = value;
        }
    }
}

fn default_database_file() -> String {
    "local.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
