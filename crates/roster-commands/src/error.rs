use roster_core::CoreError;
use thiserror::Error;

pub const CREATE_USAGE: &str = "Usage: /createuser Name|Birth(D/M/Y)|NationalID|Room|Registered(D/M/Y)\n\
    Example: /createuser NguyenVanA|20/5/1995|012345678901|101|1/9/2024";
pub const DELETE_USAGE: &str = "Usage: /deleteuser NationalID";
pub const RENEW_USAGE: &str = "Usage: /renew NationalID Registered(D/M/Y)\n\
    Example: /renew 012345678901 15/9/2025";

/// Invalid command arguments. The message tells the user how to fix them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("{usage}")]
    Usage { usage: &'static str },

    #[error("Wrong format: 5 fields separated by | are required, got {found}.\n{}", CREATE_USAGE)]
    FieldCount { found: usize },

    #[error("Invalid date `{input}`. Use D/M/Y, e.g. 1/9/2024")]
    InvalidDate { input: String },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("{field} is too long: at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

impl From<CoreError> for UsageError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidDate { input } => UsageError::InvalidDate { input },
            CoreError::EmptyField { field } => UsageError::EmptyField {
                field: field_label(field),
            },
            CoreError::TooLong { field, max } => UsageError::TooLong {
                field: field_label(field),
                max,
            },
            CoreError::Config(_) => UsageError::Usage {
                usage: CREATE_USAGE,
            },
        }
    }
}

/// User-facing name of a record field.
fn field_label(field: &'static str) -> &'static str {
    match field {
        "name" => "Name",
        "national_id" => "National ID",
        "room_number" => "Room",
        other => other,
    }
}
