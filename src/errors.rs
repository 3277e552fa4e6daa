#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    InvalidSelection(String),

    #[error("a booking is already being submitted")]
    Busy,
}

impl AppError {
    /// Failures where a user-initiated retry can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Transport(_) | AppError::InvalidResponse(_) => true,
            AppError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
