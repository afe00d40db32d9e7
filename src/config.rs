//! Server configuration: command-line flags, each backed by an environment
//! variable. A `.env` file in the working directory is loaded first.

use axum::http::HeaderValue;
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::{Result, ServiceError};

pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,https://memory-flashcard-app.netlify.app";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "flashdeck", about = "Flashcard deck REST server", long_about = None)]
pub struct ServerConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory of the Sled database.
    #[arg(long, env = "DATA_DIR", default_value = "flashdeck_data")]
    pub data_dir: PathBuf,

    /// HS256 secret used to sign and verify tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "TOKEN_TTL_HOURS", default_value_t = 720)]
    pub token_ttl_hours: i64,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Origins allowed to call the API with credentials (comma separated).
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',', default_value = DEFAULT_CORS_ORIGINS)]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Also write logs to a daily rolling file in this directory.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Skip the reference repair pass at startup.
    #[arg(long, env = "SKIP_RECONCILE")]
    pub skip_reconcile: bool,
}

impl ServerConfig {
    /// Load `.env`, then parse flags and environment. Exits on invalid input.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ServiceError::Validation("JWT_SECRET must not be empty".to_string()));
        }
        if self.token_ttl_hours <= 0 {
            return Err(ServiceError::Validation("TOKEN_TTL_HOURS must be positive".to_string()));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ServiceError::Validation("BCRYPT_COST must be between 4 and 31".to_string()));
        }
        self.allowed_origins().map(|_| ())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    pub fn allowed_origins(&self) -> Result<Vec<HeaderValue>> {
        self.cors_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|_| {
                    ServiceError::Validation(format!("invalid CORS origin: {origin}"))
                })
            })
            .collect()
    }
}
