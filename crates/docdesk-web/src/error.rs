use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docdesk_common::DocdeskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("{0}")]
    Docdesk(#[from] DocdeskError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::Multipart(e) => e.status(),
            WebError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::Docdesk(DocdeskError::ValidationRejected(_)) => StatusCode::BAD_REQUEST,
            WebError::Docdesk(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
