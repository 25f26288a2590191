use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use facematch_core::{CompareError, Subject};
use serde_json::json;
use thiserror::Error;

use crate::engine::EngineError;
use crate::resolver::ResolveError;

/// Request failure, rendered as `{"detail": "<message>"}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0} image is required in file or URL form.")]
    MissingImage(Subject),
    #[error("Failed to fetch image from URL.")]
    Fetch,
    #[error("Face not found on {}.", .0.picture_name())]
    NoFace(Subject),
    #[error("{0} image could not be decoded.")]
    InvalidImage(Subject),
    #[error("Invalid multipart form data.")]
    InvalidForm,
    #[error("Request body too large.")]
    PayloadTooLarge,
    #[error("Not Found")]
    NotFound,
    #[error("Internal server error.")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage(_)
            | ApiError::Fetch
            | ApiError::NoFace(_)
            | ApiError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidForm => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Classify a body-level failure by the status axum assigned to it.
    fn from_body_status(status: StatusCode, cause: &dyn std::fmt::Display) -> Self {
        tracing::debug!(%status, error = %cause, "unreadable form body");
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidForm
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::from_body_status(err.status(), &err)
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        ApiError::from_body_status(err.status(), &err.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(err: FormRejection) -> Self {
        ApiError::from_body_status(err.status(), &err.body_text())
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Missing(subject) => ApiError::MissingImage(subject),
            ResolveError::Fetch { .. } => ApiError::Fetch,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Compare(CompareError::NoFace(subject)) => ApiError::NoFace(subject),
            EngineError::Compare(CompareError::InvalidImage { subject, source }) => {
                tracing::debug!(%subject, error = %source, "image decode failed");
                ApiError::InvalidImage(subject)
            }
            other => {
                tracing::error!(error = %other, "face comparison failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            tracing::debug!(%status, detail = %self, "request rejected");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
