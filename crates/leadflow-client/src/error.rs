use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{message}")]
    Validation { status: u16, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("unexpected status {status}: {message}")]
    Unexpected { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("session error: {0}")]
    Session(String),
}

impl ApiError {
    /// Map a non-success response to the taxonomy. Validation messages are kept
    /// verbatim so forms can show them as the server phrased them.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = extract_message(body);
        let code = status.as_u16();
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::FORBIDDEN => ApiError::Forbidden(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation {
                status: code,
                message,
            },
            s if s.is_server_error() => ApiError::Server {
                status: code,
                message,
            },
            _ => ApiError::Unexpected {
                status: code,
                message,
            },
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ApiError::NotAuthenticated | ApiError::Unauthorized(_) | ApiError::Forbidden(_)
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

fn extract_message(body: &str) -> String {
    let trimmed = body.trim();
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return trimmed.to_string();
    };
    for key in ["detail", "message", "error"] {
        match value.get(key) {
            Some(Value::String(text)) => return text.clone(),
            // FastAPI-style validation lists are surfaced as-is.
            Some(other @ (Value::Array(_) | Value::Object(_))) => return other.to_string(),
            _ => {}
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_taxonomy() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, ""),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, "missing"),
            ApiError::NotFound(ref msg) if msg == "missing"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::Server { status: 502, .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::CONFLICT, ""),
            ApiError::Unexpected { status: 409, .. }
        ));
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = ApiError::from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": "email já cadastrado"}"#,
        );
        assert_eq!(
            err,
            ApiError::Validation {
                status: 422,
                message: "email já cadastrado".to_string()
            }
        );
        assert_eq!(err.to_string(), "email já cadastrado");
        assert!(err.is_validation());

        let plain = ApiError::from_status(StatusCode::BAD_REQUEST, "nome obrigatório\n");
        assert_eq!(plain.to_string(), "nome obrigatório");
    }

    #[test]
    fn structured_detail_is_kept_as_json() {
        let err = ApiError::from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "email"], "msg": "invalid"}]}"#,
        );
        let ApiError::Validation { message, .. } = err else {
            panic!("expected validation error");
        };
        assert!(message.contains("invalid"));
    }
}
