//! Error handler for userpages.

use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

/// MongoDB server code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("No data found")]
    NotFound,

    #[error("{}", describe(.0))]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error(transparent)]
    Form(#[from] FormRejection),

    #[error(transparent)]
    Query(#[from] QueryRejection),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Database unavailable")]
    Unavailable(#[source] MongoError),

    #[error("MongoDB request failed: {0}")]
    Database(#[source] MongoError),

    #[error("malformed document: {0}")]
    Bson(#[from] bson::de::Error),

    #[error("internal server error, {details}")]
    Internal { details: String },
}

impl From<MongoError> for ServerError {
    fn from(err: MongoError) -> Self {
        let duplicate = matches!(
            err.kind.as_ref(),
            ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
        );
        let unreachable = matches!(
            err.kind.as_ref(),
            ErrorKind::ServerSelection { .. }
                | ErrorKind::Io(_)
                | ErrorKind::ConnectionPoolCleared { .. }
        );

        if duplicate {
            ServerError::DuplicateEmail
        } else if unreachable {
            ServerError::Unavailable(err)
        } else {
            ServerError::Database(err)
        }
    }
}

fn describe(errors: &ValidationErrors) -> String {
    let mut messages = errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| match &issue.message {
                Some(message) => message.to_string(),
                None => format!("`{field}` is invalid"),
            })
        })
        .collect::<Vec<_>>();
    messages.sort();
    messages.join(", ")
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    #[serde(skip)]
    status: StatusCode,
    message: String,
}

impl ResponseError {
    /// Create a new [`ResponseError`] from a message and a status code.
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Validation(_)
            | ServerError::Json(_)
            | ServerError::Form(_)
            | ServerError::Query(_) => StatusCode::BAD_REQUEST,
            ServerError::DuplicateEmail => StatusCode::CONFLICT,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Database(_)
            | ServerError::Bson(_)
            | ServerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let response = match &self {
            ServerError::Json(rejection) => {
                ResponseError::new(rejection.body_text(), status)
            },
            ServerError::Form(rejection) => {
                ResponseError::new(rejection.body_text(), status)
            },
            ServerError::Query(rejection) => {
                ResponseError::new(rejection.body_text(), status)
            },
            ServerError::Unavailable(err) => {
                tracing::error!(error = %err, "mongodb is unreachable");
                ResponseError::new(self.to_string(), status)
            },
            ServerError::Database(_)
            | ServerError::Bson(_)
            | ServerError::Internal { .. } => {
                tracing::error!(error = %self, "server returned 500 status");
                ResponseError::new("Something went wrong", status)
            },
            _ => ResponseError::new(self.to_string(), status),
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({ "message": "Something went wrong" })
                .to_string()
                .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
