use hyper::StatusCode;

use crate::database::StoreError;

/// Failures of the credential service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required field is missing or empty after trimming.
    #[error("username and password are required")]
    InvalidInput,

    /// Registration conflict, from the pre-check or from the store's
    /// uniqueness constraint losing a race.
    #[error("username already registered")]
    UsernameTaken,

    /// Login failure. Deliberately the same for an unknown user and a wrong
    /// password.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(StoreError),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => Self::UsernameTaken,
            other => Self::Store(other),
        }
    }
}

impl AuthError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Store(_) => "DATABASE_ERROR",
            Self::Hashing(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing message. Internal failures never leak their cause.
    pub fn to_message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Solicitud inválida, se requieren 'usuario' y 'contraseña'.",
            Self::UsernameTaken => "Usuario ya registrado.",
            Self::InvalidCredentials => "Credenciales inválidas.",
            Self::Store(_) | Self::Hashing(_) => "Error interno del servidor.",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::UsernameTaken => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
