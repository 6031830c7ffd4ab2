//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, ChatConfig, ConfigError, DatabaseConfig, Environment, JwtConfig,
    ServerConfig, SnowflakeConfig, StoreBackend,
};
