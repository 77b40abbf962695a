use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_remote_db::DbError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for BookingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => BookingError::NotFound(err.to_string()),
            DbError::InvalidInput(msg) => BookingError::InvalidInput(msg),
            other => BookingError::Database(other),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BookingError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            BookingError::InvalidField(_) | BookingError::InvalidInput(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            BookingError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        tracing::error!(%status, error = %self, "Booking service error");

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_become_not_found() {
        let err = BookingError::from(DbError::not_found_with_id("parcel", "p1"));
        assert!(matches!(err, BookingError::NotFound(_)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rejected_input_is_a_bad_request() {
        let err = BookingError::from(DbError::invalid_input("parcel cost must be positive"));
        assert!(matches!(err, BookingError::InvalidInput(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_failures_do_not_leak_details() {
        let err = BookingError::from(DbError::connection("refused"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
