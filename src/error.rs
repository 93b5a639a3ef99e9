use std::fmt;
use std::error::Error as StdError;
use serde::{Serialize, Deserialize};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response, Json},
};

/// 服务错误类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServerError {
    /// 内部错误
    Internal(String),
    /// 配置错误
    Configuration(String),
    /// 网络错误
    Network(String),
    /// 序列化错误
    Serialization(String),
    /// 超时错误
    Timeout(String),
    /// 认证错误（OAuth2 access token 获取失败）
    Authentication(String),
    /// 错误请求（事件格式不合法）
    BadRequest(String),
    /// 推送平台拒绝了消息
    PushRejected {
        /// HTTP 状态码
        status: u16,
        /// 平台错误码，例如 UNREGISTERED / INVALID_ARGUMENT
        code: String,
        /// 平台错误描述
        message: String,
    },
}

impl ServerError {
    /// 推送平台拒绝消息的快捷构造
    pub fn push_rejected(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerError::PushRejected {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Internal(msg) => write!(f, "Internal error: {}", msg),
            ServerError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::Network(msg) => write!(f, "Network error: {}", msg),
            ServerError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ServerError::Timeout(msg) => write!(f, "Timeout error: {}", msg),
            ServerError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            ServerError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ServerError::PushRejected { status, code, message } => {
                if message.is_empty() {
                    write!(f, "Push rejected (status {}): {}", status, code)
                } else {
                    write!(f, "Push rejected (status {}): {}: {}", status, code, message)
                }
            }
        }
    }
}

impl StdError for ServerError {}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ServerError::BadRequest(_) | ServerError::Serialization(_) => StatusCode::BAD_REQUEST,
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error_response = ErrorResponse::new(&self);
        (status_code, Json(error_response)).into_response()
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServerError::Timeout(err.to_string())
        } else {
            ServerError::Network(err.to_string())
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ServerError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ServerError::Authentication(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ServerError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ServerError::Timeout(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ServerError>;

/// 错误代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// 内部错误
    Internal = 1000,
    /// 认证错误
    Authentication = 1001,
    /// 网络错误
    Network = 2001,
    /// 序列化错误
    Serialization = 2002,
    /// 配置错误
    Configuration = 2003,
    /// 超时错误
    Timeout = 3002,
    /// 错误请求
    BadRequest = 5004,
    /// 推送被拒绝
    PushRejected = 6000,
}

impl From<&ServerError> for ErrorCode {
    fn from(error: &ServerError) -> Self {
        match error {
            ServerError::Internal(_) => ErrorCode::Internal,
            ServerError::Configuration(_) => ErrorCode::Configuration,
            ServerError::Network(_) => ErrorCode::Network,
            ServerError::Serialization(_) => ErrorCode::Serialization,
            ServerError::Timeout(_) => ErrorCode::Timeout,
            ServerError::Authentication(_) => ErrorCode::Authentication,
            ServerError::BadRequest(_) => ErrorCode::BadRequest,
            ServerError::PushRejected { .. } => ErrorCode::PushRejected,
        }
    }
}

/// 错误响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: ErrorCode,
    /// 错误消息
    pub message: String,
    /// 时间戳
    pub timestamp: u64,
}

impl ErrorResponse {
    /// 创建错误响应
    pub fn new(error: &ServerError) -> Self {
        Self {
            code: ErrorCode::from(error),
            message: error.to_string(),
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_rejected_display_includes_code() {
        let err = ServerError::push_rejected(404, "UNREGISTERED", "Requested entity was not found.");
        assert_eq!(
            err.to_string(),
            "Push rejected (status 404): UNREGISTERED: Requested entity was not found."
        );

        let bare = ServerError::push_rejected(400, "registration-token-not-registered", "");
        assert!(bare.to_string().contains("registration-token-not-registered"));
    }

    #[test]
    fn test_bad_request_maps_to_400() {
        let response = ServerError::BadRequest("missing value".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            ErrorCode::from(&ServerError::Timeout("slow".to_string())),
            ErrorCode::Timeout
        );
        assert_eq!(
            ErrorCode::from(&ServerError::push_rejected(429, "QUOTA_EXCEEDED", "")),
            ErrorCode::PushRejected
        );
    }
}
