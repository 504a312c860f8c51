use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use protocol::{ErrorBody, ErrorCode};

use crate::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Request did not contain valid JSON.")]
    NotJson,

    /// Same condition as [`ProxyError::NotJson`] on the login endpoint, which
    /// answers 500 instead of 400. Some clients only cope with the 500 there.
    #[error("Request did not contain valid JSON.")]
    LoginNotJson,

    #[error("Missing access token.")]
    MissingToken,

    #[error("Unrecognised access token.")]
    UnknownToken,

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NotJson => StatusCode::BAD_REQUEST,
            ProxyError::LoginNotJson => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::MissingToken => StatusCode::UNAUTHORIZED,
            ProxyError::UnknownToken => StatusCode::UNAUTHORIZED,
            ProxyError::Session(SessionError::Upstream(response)) => {
                StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::Session(SessionError::Transport(_)) => StatusCode::BAD_GATEWAY,
            ProxyError::Session(SessionError::InvalidResponse(_)) => StatusCode::BAD_GATEWAY,
            ProxyError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Upstream answers are relayed as-is, never re-coded.
        if let ProxyError::Session(SessionError::Upstream(response)) = self {
            return HttpResponse::build(status)
                .content_type("application/json")
                .body(response.body.clone());
        }

        let code = match self {
            ProxyError::NotJson | ProxyError::LoginNotJson => ErrorCode::NotJson,
            ProxyError::MissingToken => ErrorCode::MissingToken,
            ProxyError::UnknownToken => ErrorCode::UnknownToken,
            _ => ErrorCode::Unknown,
        };

        HttpResponse::build(status).json(ErrorBody::new(code, self.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
