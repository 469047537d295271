use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] econfeed_core::ValidationError),

    #[error(transparent)]
    Config(#[from] econfeed_core::ConfigError),

    #[error(transparent)]
    Setup(#[from] econfeed_core::CoreError),

    #[error(transparent)]
    Cache(#[from] econfeed_core::CacheError),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Setup(_) => 2,
            Self::Cache(_) => 4,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
