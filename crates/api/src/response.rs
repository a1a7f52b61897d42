//! Response envelope: `{statusCode, message, data?}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// JSON envelope shared by every response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with data.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, Some(data))
    }

    /// 201 with data.
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, Some(data))
    }

    /// 200 "Success" with data, used by reads.
    pub fn success(data: T) -> Self {
        Self::ok("Success", data)
    }

    fn with_status(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            data,
        }
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK)
    }
}

impl ApiResponse<()> {
    /// Message without data.
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self::with_status(status, message, None)
    }

    /// 200 message without data.
    pub fn done(message: impl Into<String>) -> Self {
        Self::message(StatusCode::OK, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::created("Category created successfully", 5)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "statusCode": 201,
                "message": "Category created successfully",
                "data": 5
            })
        );
    }

    #[test]
    fn test_message_only_omits_data() {
        let body = serde_json::to_value(ApiResponse::done("Sign out successful")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"statusCode": 200, "message": "Sign out successful"})
        );
    }

    #[test]
    fn test_status_is_applied() {
        let response = ApiResponse::created("created", 1).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
