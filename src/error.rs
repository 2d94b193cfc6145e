//! Error types for weekpass.

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("Session state error: {0}")]
    Session(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Destination store errors.
///
/// `DestinationTooLong` is recoverable (the engine keeps the session in the
/// same step); `MissingMatricule` is fatal for the turn (session reset).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Destination must be {max} characters or less (got {length})")]
    DestinationTooLong { length: usize, max: usize },

    #[error("Cannot set destination: {family_name} {given_name} has no matricule")]
    MissingMatricule {
        family_name: String,
        given_name: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Weekly export errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Roster seeding errors.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type alias for the assistant.
pub type Result<T> = std::result::Result<T, Error>;
