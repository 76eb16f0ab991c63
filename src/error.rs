use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::critique::CritiqueError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Critique(#[from] CritiqueError),
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Missing form field '{0}'")]
    MissingField(&'static str),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Critique(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Multipart(err) => match err.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ApiError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            error!("Error processing request: {}", message);
        } else {
            warn!("Rejected request ({}): {}", status, message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ImageError;

    #[test]
    fn maps_errors_to_status_codes() {
        assert_eq!(
            ApiError::Critique(CritiqueError::Image(ImageError::Empty)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::MissingField("brand").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::NotFound("Brand 'x' not found".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn critique_faults_surface_their_message() {
        let err = ApiError::from(CritiqueError::Image(ImageError::Empty));
        assert_eq!(err.to_string(), "Uploaded image is empty");
        assert_eq!(
            ApiError::MissingField("file").to_string(),
            "Missing form field 'file'"
        );
    }
}
