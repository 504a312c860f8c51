//! Error bodies synthesized locally by the proxy.

use serde::{Deserialize, Serialize};

/// Error codes the proxy emits on its own. Every other code is relayed
/// untouched from the homeserver.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    #[serde(rename = "M_NOT_JSON")]
    NotJson,
    #[serde(rename = "M_MISSING_TOKEN")]
    MissingToken,
    #[serde(rename = "M_UNKNOWN_TOKEN")]
    UnknownToken,
    #[serde(rename = "M_UNKNOWN")]
    Unknown,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotJson => "M_NOT_JSON",
            Self::MissingToken => "M_MISSING_TOKEN",
            Self::UnknownToken => "M_UNKNOWN_TOKEN",
            Self::Unknown => "M_UNKNOWN",
        }
    }

    /// Human readable message paired with the code in local error bodies.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::NotJson => "Request did not contain valid JSON.",
            Self::MissingToken => "Missing access token.",
            Self::UnknownToken => "Unrecognised access token.",
            Self::Unknown => "Unknown error.",
        }
    }
}

/// `{"errcode": ..., "error": ...}` body. Field order is part of the wire
/// format clients see.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub errcode: String,
    pub error: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            errcode: code.as_str().to_string(),
            error: error.into(),
        }
    }
}

impl From<ErrorCode> for ErrorBody {
    fn from(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }
}
