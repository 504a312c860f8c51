//! Password login request and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Reasons an inbound body could not be read as a JSON object.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("body is not a JSON object")]
    NotObject,
}

/// Fields the proxy needs from an inbound login body.
///
/// Clients send either the current `{"identifier": {"user": ...}}` form or
/// the legacy top-level `user` field. Anything else in the body is ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoginRequest {
    pub user: String,
    pub password: String,
    pub device_id: Option<String>,
    pub initial_device_display_name: Option<String>,
}

impl LoginRequest {
    pub fn parse(body: &[u8]) -> Result<Self, BodyError> {
        let value: Value = serde_json::from_slice(body)?;
        let object = value.as_object().ok_or(BodyError::NotObject)?;
        Ok(Self::from_object(object))
    }

    /// Username precedence: `identifier.user`, then `user`, then empty.
    pub fn from_object(body: &Map<String, Value>) -> Self {
        let identifier_user = body
            .get("identifier")
            .and_then(|identifier| identifier.get("user"))
            .and_then(Value::as_str)
            .filter(|user| !user.is_empty());

        let user = identifier_user
            .or_else(|| body.get("user").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        Self {
            user,
            password: string_field(body, "password").unwrap_or_default(),
            device_id: string_field(body, "device_id").filter(|id| !id.is_empty()),
            initial_device_display_name: string_field(body, "initial_device_display_name"),
        }
    }
}

fn string_field(body: &Map<String, Value>, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Identifier sent upstream for `m.login.password`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: String,
}

impl UserIdentifier {
    #[must_use]
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            kind: "m.id.user".to_string(),
            user: user.into(),
        }
    }
}

/// Body of the upstream password login call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordLogin {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: UserIdentifier,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub initial_device_display_name: String,
}

impl PasswordLogin {
    #[must_use]
    pub fn new(
        user: &str,
        password: &str,
        device_id: Option<&str>,
        initial_device_display_name: &str,
    ) -> Self {
        Self {
            kind: "m.login.password".to_string(),
            identifier: UserIdentifier::user(user),
            password: password.to_string(),
            device_id: device_id.map(str::to_owned),
            initial_device_display_name: initial_device_display_name.to_string(),
        }
    }
}

/// Successful login response from the homeserver.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: String,
    pub device_id: String,
}
