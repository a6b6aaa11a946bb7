use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned HTTP {status}: {body}")]
    ApiStatusError { status: u16, body: String },

    #[error("API rejected the request: {message}")]
    ApiRejectedError { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Column '{column}' not found in {file}")]
    MissingColumnError { column: String, file: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

impl EtlError {
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EtlError::ConfigError { .. }
                | EtlError::MissingConfigError { .. }
                | EtlError::InvalidConfigValueError { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ApiError(_) | EtlError::ApiStatusError { .. } => {
                "Check the API endpoint, network access and request timeout"
            }
            EtlError::ApiRejectedError { .. } => {
                "Check the client code and account values sent to the API"
            }
            EtlError::CsvError(_) | EtlError::MissingColumnError { .. } => {
                "Check the delimiter, quoting and header row of the input file"
            }
            EtlError::IoError(_) => "Check that the file exists and the path is writable",
            EtlError::SerializationError(_) => "Check the API response format",
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. } => {
                "Check the configuration file and command line flags"
            }
            EtlError::ProcessingError { .. } => "Inspect the input data for malformed rows",
        }
    }

    /// Process exit code used by the CLI when a job fails.
    pub fn exit_code(&self) -> i32 {
        if self.is_config_error() {
            1
        } else {
            2
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
