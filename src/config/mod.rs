use std::env;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

/// Runtime configuration, resolved once at startup from the environment.
///
/// The upload/generated directories are plain injected paths so tests can
/// point every instance at its own scratch space.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub upload_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub max_file_size_mb: usize,
    pub max_files: usize,
    pub max_concurrent_requests: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| {
                info!("SERVER_HOST not set, using default: 0.0.0.0");
                "0.0.0.0".to_string()
            }),
            server_port: Self::parse_env_var("SERVER_PORT", 5000),
            upload_dir: PathBuf::from(
                env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
            generated_dir: PathBuf::from(
                env::var("GENERATED_DIR").unwrap_or_else(|_| "generated".to_string()),
            ),
            max_file_size_mb: Self::parse_env_var("MAX_FILE_SIZE_MB", 10),
            max_files: Self::parse_env_var("MAX_FILES", 50),
            max_concurrent_requests: Self::parse_env_var("MAX_CONCURRENT_REQUESTS", 100),
        };

        config.validate()?;

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> T
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.parse() {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(
                        "Failed to parse {}: {} (using default: {:?})",
                        var_name, e, default
                    );
                    default
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                default
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must be greater than 0"));
        }
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_files == 0 {
            return Err(anyhow::anyhow!("MAX_FILES must be greater than 0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_REQUESTS must be greater than 0"
            ));
        }
        if self.upload_dir.as_os_str().is_empty() || self.generated_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!(
                "UPLOAD_DIR and GENERATED_DIR must not be empty"
            ));
        }
        Ok(())
    }

    /// Per-file cap in bytes.
    pub fn max_file_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Whole-request body cap: all files at their limit plus slack for the
    /// multipart framing.
    pub fn max_body_bytes(&self) -> usize {
        self.max_files * self.max_file_bytes() + 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "0.0.0.0".to_string(),
            server_port: 5000,
            upload_dir: PathBuf::from("uploads"),
            generated_dir: PathBuf::from("generated"),
            max_file_size_mb: 10,
            max_files: 50,
            max_concurrent_requests: 100,
        }
    }
}
