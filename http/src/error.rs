use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use murmur_application::{ApplicationError, ChunkError};
use murmur_domain::DomainError;

#[derive(Debug)]
pub enum HttpError {
    BadRequest { message: String },
    NotAcceptable { message: String },
    NotFound { message: String },
    RangeNotSatisfiable { message: String },
    Internal { message: String },
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            HttpError::NotAcceptable { message } => (StatusCode::NOT_ACCEPTABLE, message),
            HttpError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            HttpError::RangeNotSatisfiable { message } => {
                (StatusCode::RANGE_NOT_SATISFIABLE, message)
            }
            HttpError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            tracing::error!(%status, %message, "request failed");
        } else {
            tracing::debug!(%status, %message, "request rejected");
        }

        (
            status,
            Json(json!({
                "error": message,
            })),
        )
            .into_response()
    }
}

/// Upload protocol violations split between unusable headers (406) and
/// rejected chunks (400); everything else defers to the domain mapping.
pub fn error_mapper(error: ApplicationError) -> HttpError {
    match error {
        ApplicationError::Chunk(chunk) => match &chunk {
            ChunkError::MalformedRange(_)
            | ChunkError::LengthMismatch(_)
            | ChunkError::TotalMismatch(_)
            | ChunkError::ResumeTotalMismatch(_) => HttpError::NotAcceptable {
                message: chunk.to_string(),
            },
            ChunkError::ContentTypeMismatch(_)
            | ChunkError::BodySizeMismatch { .. }
            | ChunkError::NotContiguous(_) => HttpError::BadRequest {
                message: chunk.to_string(),
            },
        },
        ApplicationError::Domain(domain) => domain_error_mapper(domain),
    }
}

pub fn domain_error_mapper(error: DomainError) -> HttpError {
    match error {
        DomainError::NotFound(message) => HttpError::NotFound { message },
        DomainError::Validation(message) => HttpError::BadRequest { message },
        other => HttpError::Internal {
            message: other.to_string(),
        },
    }
}
