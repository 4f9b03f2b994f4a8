use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("upstream error: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("daily limit reached")]
    QuotaExceeded {
        used: i32,
        limit: i32,
        plan: &'static str,
    },
    #[error("{0}")]
    Message(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(?self);
        match self {
            AppError::QuotaExceeded { used, limit, plan } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "success": false,
                    "error": "Daily limit reached",
                    "used": used,
                    "limit": limit,
                    "plan": plan,
                })),
            )
                .into_response(),
            AppError::NotFound => error_body(StatusCode::NOT_FOUND, "not found"),
            AppError::Unauthorized => error_body(StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::Forbidden(message) => error_body(StatusCode::FORBIDDEN, &message),
            AppError::BadRequest(message) => error_body(StatusCode::BAD_REQUEST, &message),
            AppError::Db(_) | AppError::Upstream(_) => {
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
            AppError::Message(message) => error_body(StatusCode::INTERNAL_SERVER_ERROR, &message),
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

pub type AppResult<T> = Result<T, AppError>;
