use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use linkvote_db::DbError;
use linkvote_types::api::{ErrorResponse, FieldError};

pub(crate) const INVALID_RESET_TOKEN: &str = "Invalid or expired password reset token";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{message}")]
    BadCredentials {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn validation(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn field(field: &str, message: &str) -> Self {
        Self::validation(message, vec![FieldError::new(field, message)])
    }

    /// Log an unexpected failure and hide it behind the generic error.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, err);
        Self::Internal
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::BadCredentials { .. } | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::BadCredentials { .. } => "bad_credentials",
            Self::NotFound(_) => "not_found",
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::Conflict(_) => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::PostNotFound(_) => Self::NotFound("Post not found".into()),
            DbError::NotAuthor { .. } => Self::Unauthorized,
            DbError::ResetTokenSpent(_) => Self::field("token", INVALID_RESET_TOKEN),
            DbError::Conflict(_) => {
                Self::Conflict("The post is busy, please retry the vote".into())
            }
            other => Self::internal("database error", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = self.to_string();
        let errors = match self {
            Self::Validation { errors, .. } | Self::BadCredentials { errors, .. } => errors,
            _ => Vec::new(),
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            success: false,
            error: kind.to_string(),
            message,
            errors,
        };

        (status, Json(body)).into_response()
    }
}
