use thiserror::Error;

#[derive(Error, Debug)]
pub enum NoteError {
    #[error("Cannot resolve location '{location}': {reason}")]
    ResolutionError { location: String, reason: String },

    #[error("Unsupported note format: {message}")]
    FormatError { message: String },

    #[error("Fetching {url} failed with status {status}")]
    FetchError { url: String, status: u16 },

    #[error("Encrypted note requires a password: add '#key=<password>' to the link")]
    MissingPasswordError,

    #[error("Cannot decrypt note ({message}), the password is probably wrong")]
    DecryptionError { message: String },

    #[error("Invalid 'amount' [{input}], expect a float or a math expression")]
    InvalidAmountError { input: String },

    #[error("Missing both payer and receiver")]
    MissingPartyError,

    #[error("Missing currency unit")]
    MissingCurrencyError,

    #[error("Missing order items")]
    EmptyOrderError,

    #[error("Missing shared people")]
    EmptyGroupError,

    #[error("Invalid value for '{field}': {value}")]
    InvalidFieldError { field: String, value: String },

    #[error("Missing conversion from currency `{currency}` into `{target}` in transaction id = {tx}")]
    MissingRateError {
        currency: String,
        target: String,
        tx: i64,
    },

    #[error("Cannot convert the rate `{input}`")]
    InvalidRateError { input: String },

    #[error("Failed to save {what}: {reason}")]
    SaveError { what: String, reason: String },

    #[error("No {what} found for '{key}'")]
    NotFoundError { what: String, key: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML processing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl NoteError {
    /// Errors that end an import run; everything else is collected per note.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            NoteError::ResolutionError { .. }
                | NoteError::FormatError { .. }
                | NoteError::FetchError { .. }
                | NoteError::MissingPasswordError
                | NoteError::DecryptionError { .. }
                | NoteError::HttpError(_)
                | NoteError::CsvError(_)
                | NoteError::IoError(_)
                | NoteError::YamlError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NoteError>;
