use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::models::ApiResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("movie must have at least one artist")]
    NoArtist,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("you have already voted for this movie")]
    AlreadyVoted,

    #[error("you haven't voted for this movie yet")]
    NotVoted,

    #[error("username already exists")]
    UsernameTaken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidOrExpired,

    #[error("token has been revoked")]
    Revoked,

    #[error("access denied, admins only")]
    Forbidden,

    #[error("store failure: {0}")]
    Store(#[from] DbErr),

    #[error("cache failure: {0}")]
    Cache(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Coarse classification callers branch on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthenticated,
    Forbidden,
    Store,
    Cache,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::NoArtist => ErrorKind::Validation,
            AppError::NotFound(_) | AppError::NotVoted => ErrorKind::NotFound,
            AppError::AlreadyVoted | AppError::UsernameTaken => ErrorKind::Conflict,
            AppError::InvalidCredentials | AppError::InvalidOrExpired | AppError::Revoked => {
                ErrorKind::Unauthenticated
            },
            AppError::Forbidden => ErrorKind::Forbidden,
            AppError::Store(_) | AppError::Internal(_) => ErrorKind::Store,
            AppError::Cache(_) => ErrorKind::Cache,
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Store | ErrorKind::Cache => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Which constraint a failed write tripped, if any.
pub(crate) enum Violation {
    Unique,
    ForeignKey,
}

pub(crate) fn violation(err: &DbErr) -> Option<Violation> {
    match err.sql_err()? {
        SqlErr::UniqueConstraintViolation(_) => Some(Violation::Unique),
        SqlErr::ForeignKeyConstraintViolation(_) => Some(Violation::ForeignKey),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.kind() {
            ErrorKind::Store | ErrorKind::Cache => {
                tracing::error!(error = %self, "request failed");
                "internal server error".to_string()
            },
            _ => self.to_string(),
        };

        (status, Json(ApiResponse::<()>::fail(status, message))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
