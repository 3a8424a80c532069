use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
    /// Run message append + thread summary update in one transaction.
    /// Requires a replica set or sharded cluster.
    pub transactions: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub reset_token_ttl_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub min_password_len: usize,
    /// Return the password reset token in the response body. Test setups only.
    pub expose_reset_token: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub root_dir: String,
    pub public_base_url: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("RESIDENT"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "resident_house")?
            .set_default("database.transactions", false)?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.refresh_token_ttl_secs", 604800)?
            .set_default("jwt.reset_token_ttl_secs", 900)?
            .set_default("jwt.issuer", "resident-house")?
            .set_default("auth.min_password_len", 6)?
            .set_default("auth.expose_reset_token", false)?
            .set_default("storage.root_dir", "/tmp/resident-house-storage")?
            .set_default("storage.public_base_url", "/api/storage")?
            .build()?;

        config.try_deserialize()
    }
}
