use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    message::MessageService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub message_service: MessageService,
}

impl AppState {
    pub fn new(config: Config, message_service: MessageService) -> Self {
        Self {
            config: Arc::new(config),
            message_service,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret: required("JWT_SECRET")?,
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed_or("PORT", 3000)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AppError::Config(format!("{} must be set", key)))
}

/// Reads `key` as a `T`, falling back to `default` when unset.
pub(crate) fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a number, got {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}
