use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Directory holding the JSON stores.
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    /// Built-in motion library, `<group>/<name>.qianim`.
    pub moves_dir: PathBuf,
    /// Static files of the operator UI.
    pub assets_dir: PathBuf,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let data_dir = path_var("DATA_DIR")?.unwrap_or_else(|| PathBuf::from("data"));
        let uploads_dir = path_var("UPLOADS_DIR")?.unwrap_or_else(|| data_dir.join("uploads"));
        let moves_dir = path_var("MOVES_DIR")?
            .unwrap_or_else(|| data_dir.join("pepper-core-anims-master"));
        let assets_dir = path_var("ASSETS_DIR")?.unwrap_or_else(|| PathBuf::from("assets"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            data_dir,
            uploads_dir,
            moves_dir,
            assets_dir,
            log_level,
        })
    }

    pub fn store_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

/// Reads an optional path variable; set but empty is rejected.
fn path_var(name: &str) -> Result<Option<PathBuf>, ConfigError> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::InvalidValue(
            name.to_string(),
            "path must not be empty".to_string(),
        )),
        Ok(value) => Ok(Some(PathBuf::from(value))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue(
            name.to_string(),
            "path is not valid unicode".to_string(),
        )),
    }
}
