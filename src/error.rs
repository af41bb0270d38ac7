// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::session::SessionError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match &err {
            SessionError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            SessionError::Conflict { .. } => StatusCode::CONFLICT,
            SessionError::Unauthorized => StatusCode::UNAUTHORIZED,
            SessionError::Forbidden => StatusCode::FORBIDDEN,
            SessionError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                return Self::internal();
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn session_errors_map_to_status() {
        let cases = [
            (SessionError::ValidationFailed("bad".into()), StatusCode::BAD_REQUEST),
            (SessionError::Conflict { field: "email" }, StatusCode::CONFLICT),
            (SessionError::Unauthorized, StatusCode::UNAUTHORIZED),
            (SessionError::Forbidden, StatusCode::FORBIDDEN),
            (SessionError::InvalidOrExpiredToken, StatusCode::BAD_REQUEST),
            (SessionError::NotFound("user".into()), StatusCode::NOT_FOUND),
            (SessionError::internal("disk"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn conflict_names_field() {
        let err = ApiError::from(SessionError::Conflict { field: "username" });
        assert_eq!(err.message, "User with this username already exists.");
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err = ApiError::from(SessionError::internal("redb storage error: /var/data"));
        assert_eq!(err.message, "Internal server error");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }
}
