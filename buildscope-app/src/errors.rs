use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use buildscope_core::errors::BuildScopeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct AppError(Box<ErrorKind>);

#[derive(Error, Debug)]
#[error(transparent)]
pub enum ErrorKind {
    #[error("BuildScopeError: {0}")]
    BuildScope(#[from] BuildScopeError),
    #[error("MultipartError: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Missing multipart field `{0}`")]
    MissingField(&'static str),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("SerdeJsonError: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl<E> From<E> for AppError
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        AppError(Box::new(ErrorKind::from(err)))
    }
}

impl AppError {
    pub fn missing_field(name: &'static str) -> Self {
        AppError(Box::new(ErrorKind::MissingField(name)))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    fn get_codes(&self) -> (StatusCode, u16) {
        match *self.0 {
            ErrorKind::Multipart(_) => (StatusCode::BAD_REQUEST, 40001),
            ErrorKind::MissingField(_) => (StatusCode::BAD_REQUEST, 40002),
            ErrorKind::BuildScope(_) => (StatusCode::INTERNAL_SERVER_ERROR, 50001),
            ErrorKind::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, 50002),
            ErrorKind::SerdeJson(_) => (StatusCode::INTERNAL_SERVER_ERROR, 50003),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorCode {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, code) = self.get_codes();
        let message = self.to_string();
        let body = Json(ErrorCode { code, message });
        (status_code, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
