use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Feed fetch failed or timed out. The tick is skipped and retried next interval.
    #[error("Upstream feed unavailable: {0}")]
    TransientUpstream(String),

    #[error("Feed payload error: {0}")]
    FeedParse(String),

    /// The all-or-nothing batch write was rejected.
    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("Prediction already exists for user {user_id} on game {game_id} event {event_key}")]
    DuplicatePrediction {
        user_id: String,
        game_id: String,
        event_key: String,
    },

    #[error("Invalid prediction: {0}")]
    InvalidPrediction(String),

    /// The at-bat or pitcher line already has a known result.
    #[error("Predictions closed: {0}")]
    SubmissionClosed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Failures that heal on a later tick without intervention. Row decode errors don't:
    /// the same bytes fail the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Database(e) => !matches!(
                e,
                sqlx::Error::Decode(_)
                    | sqlx::Error::ColumnDecode { .. }
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::TypeNotFound { .. }
            ),
            AppError::Http(_) | AppError::TransientUpstream(_) | AppError::PersistenceConflict(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicatePrediction { .. } | AppError::SubmissionClosed(_) => StatusCode::CONFLICT,
            AppError::InvalidPrediction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Http(_) | AppError::TransientUpstream(_) | AppError::FeedParse(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
