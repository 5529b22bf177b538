use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// HTTP-facing error: a status code and the detail shown to the client.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 422 Unprocessable Entity
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg)
    }

    /// 500 carrying `err` behind a localised prefix, e.g. `データの取得に失敗しました`.
    pub fn internal_with(prefix: &str, err: impl fmt::Display) -> Self {
        Self::internal(format!("{prefix}: {err}"))
    }
}

/// Localised detail prefixes, one per failing step.
pub mod detail {
    pub const FETCH_FAILED: &str = "データの取得に失敗しました";
    pub const CONVERT_FAILED: &str = "データの変換に失敗しました";
    pub const NORMALIZE_FAILED: &str = "入力の正規化に失敗しました";
    pub const CREATE_FAILED: &str = "アイテムの追加に失敗しました";
    pub const UPDATE_FAILED: &str = "アイテムの更新に失敗しました";
    pub const IMAGE_SCAN_FAILED: &str = "画像の処理に失敗しました";
    pub const IMAGE_UPLOAD_FAILED: &str = "画像のアップロードに失敗しました";
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "detail": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}
