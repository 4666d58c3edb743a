use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// A uniqueness constraint in the store rejected the write.
    #[error("{0}")]
    Conflict(String),

    /// The referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A store operation failed unexpectedly.
    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "BAD_REQUEST",
            Error::Conflict(_) => "CONFLICT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the message can be returned to a client verbatim.
    pub fn is_client_safe(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Conflict(_) | Error::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
