//! Error types for bimetrics-api

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bimetrics_core::error::{ErrorCode, ErrorDetails};
use bimetrics_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Core(error) => match error.code() {
                ErrorCode::ReportNotFound => StatusCode::NOT_FOUND,
                ErrorCode::NotHierarchical | ErrorCode::InputShape => StatusCode::BAD_REQUEST,
                ErrorCode::StructuralError | ErrorCode::InvalidFieldSpec | ErrorCode::InvalidPeriod => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ErrorCode::IoError => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Body returned to the client
    pub fn details(&self) -> ErrorDetails {
        match self {
            ApiError::Core(error) => error.to_details(),
            ApiError::BadRequest { .. } => ErrorDetails::new(ErrorCode::InputShape, self.to_string())
                .with_suggestion("Send a JSON body with the fields the endpoint expects.".to_string()),
        }
    }
}

/// Malformed or mistyped request bodies
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.details())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
