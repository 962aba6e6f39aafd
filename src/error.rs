use thiserror::Error;

/// Error type shared by the library and the `run` binary
#[derive(Error, Debug)]
pub enum RlError {
    // Data structure errors
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Command line errors
    #[error("Unknown environment id `{id}` (known ids: {known})")]
    UnknownEnv { id: String, known: String },

    #[error("Invalid number of timesteps `{0}`: expected a positive whole number such as 100000 or 1e5")]
    InvalidTimesteps(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Checkpoint errors
    #[error("Recorder error: {0}")]
    Recorder(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, RlError>;
