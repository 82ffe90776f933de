use clap::Parser;
use rand::Rng;
use serde::Deserialize;
use std::path::PathBuf;

use crate::auth::token::DEFAULT_TOKEN_HOURS;

/// Environment variable that overrides `auth.jwt_secret`.
pub const JWT_SECRET_ENV: &str = "FOLIO_JWT_SECRET";

#[derive(Parser, Debug)]
#[command(name = "folio", about = "A blogging backend")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS. Empty means no cross-origin access.
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub token_hours: u64,
    pub bcrypt_cost: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_hours", &self.token_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_hours: DEFAULT_TOKEN_HOURS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("folio.db"));
        }

        config.token_ttl()?;

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".folio")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("folio.db"))
    }

    /// `auth.token_hours` as a duration. Fails for values chrono cannot
    /// represent.
    pub fn token_ttl(&self) -> anyhow::Result<chrono::Duration> {
        i64::try_from(self.auth.token_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| {
                anyhow::anyhow!("auth.token_hours is out of range: {}", self.auth.token_hours)
            })
    }

    /// The HS256 signing secret: the environment beats the config file, and
    /// with neither a random per-process secret is generated.
    pub fn signing_secret(&self) -> Vec<u8> {
        self.resolve_secret(std::env::var(JWT_SECRET_ENV).ok())
    }

    fn resolve_secret(&self, from_env: Option<String>) -> Vec<u8> {
        if let Some(secret) = from_env.filter(|s| !s.is_empty()) {
            return secret.into_bytes();
        }
        if let Some(secret) = self.auth.jwt_secret.as_ref().filter(|s| !s.is_empty()) {
            return secret.clone().into_bytes();
        }

        tracing::warn!(
            "No JWT secret configured (set {} or auth.jwt_secret); tokens will not survive a restart",
            JWT_SECRET_ENV
        );
        rand::thread_rng().gen::<[u8; 32]>().to_vec()
    }
}
