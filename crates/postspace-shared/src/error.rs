use thiserror::Error;

/// Input rejected before it reaches the store or the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field `{field}` is too long ({len} chars, max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Invalid coordinates: all components must be finite")]
    InvalidCoordinates,
}
