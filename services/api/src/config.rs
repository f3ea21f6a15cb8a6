use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub daily_api_key: String,
    pub daily_api_url: String,
    pub max_bots_per_room: usize,
    pub room_expiry_secs: u64,
    pub finished_retention_secs: u64,
    pub worker_program: PathBuf,
    pub worker_dir: Option<PathBuf>,
    pub log_level: Level,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:7860".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let daily_api_key = std::env::var("DAILY_API_KEY")
            .map_err(|_| ConfigError::MissingVar("DAILY_API_KEY".to_string()))?;

        let daily_api_url = std::env::var("DAILY_API_URL")
            .unwrap_or_else(|_| "https://api.daily.co/v1".to_string());

        let max_bots_per_room = parse_var("MAX_BOTS_PER_ROOM", 1usize)?;
        if max_bots_per_room == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_BOTS_PER_ROOM".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let room_expiry_secs = parse_var("ROOM_EXPIRY_SECS", 3600u64)?;
        let finished_retention_secs = parse_var("FINISHED_RETENTION_SECS", 300u64)?;

        let worker_program = std::env::var("WORKER_PROGRAM")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("parley-bot"));
        let worker_dir = std::env::var("WORKER_DIR").ok().map(PathBuf::from);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            daily_api_key,
            daily_api_url,
            max_bots_per_room,
            room_expiry_secs,
            finished_retention_secs,
            worker_program,
            worker_dir,
            log_level,
        })
    }
}
