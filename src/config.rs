//! Environment-backed configuration, loaded once at process start.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Assistant configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the libSQL database file.
    pub db_path: PathBuf,
    /// Hex-encoded SHA-256 digest of the export passphrase.
    pub secret_hash: SecretString,
    /// Telegram bot token. `None` runs the CLI channel only.
    pub telegram_token: Option<SecretString>,
    /// Telegram allowlist; `"*"` allows everyone.
    pub telegram_allowed_users: Vec<String>,
    /// Directory where weekly export files are written.
    pub export_dir: PathBuf,
    /// Optional roster CSV used to seed an empty students table.
    pub roster_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret_hash = std::env::var("WEEKPASS_SECRET_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("WEEKPASS_SECRET_HASH".into()))?;
        let secret_hash = validate_secret_hash(&secret_hash)?;

        let db_path = std::env::var("WEEKPASS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/weekpass.db"));

        let export_dir = std::env::var("WEEKPASS_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/exports"));

        let roster_path = std::env::var("WEEKPASS_ROSTER").ok().map(PathBuf::from);

        let telegram_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        let telegram_allowed_users: Vec<String> = std::env::var("TELEGRAM_ALLOWED_USERS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            db_path,
            secret_hash: SecretString::from(secret_hash),
            telegram_token,
            telegram_allowed_users,
            export_dir,
            roster_path,
        })
    }
}

/// Validate and normalize a hex-encoded SHA-256 digest.
fn validate_secret_hash(value: &str) -> Result<String, ConfigError> {
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.len() != 64 || !normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidValue {
            key: "WEEKPASS_SECRET_HASH".into(),
            message: "expected a 64-character hex SHA-256 digest".into(),
        });
    }
    Ok(normalized)
}
