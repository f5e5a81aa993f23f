use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date: {input}")]
    InvalidDate { input: String },

    #[error("Required field is empty: {field}")]
    EmptyField { field: &'static str },

    #[error("Field {field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;
