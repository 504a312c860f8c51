//! Contract between the proxy and the per-credential encrypted session.
//!
//! The proxy decides when session operations run and how their outcomes
//! shape the HTTP response. Key material, device trust bookkeeping and event
//! encryption live behind [`ClientSession`].

pub mod error;
pub mod homeserver;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use error::{Result, SessionError};
pub use homeserver::{HomeserverSession, HomeserverSessionFactory};

/// Raw status and body of a homeserver response, relayed without
/// interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of a homeserver call that can come back in a successful shape or
/// as any other response, which is relayed to the client untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream<T> {
    Success(T),
    Failure(UpstreamResponse),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub access_token: String,
    pub response: UpstreamResponse,
}

/// A device identity as reported by a key query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub user_id: String,
    pub device_id: String,
    pub display_name: Option<String>,
    pub deleted: bool,
}

/// Devices whose keys changed since the previous query, keyed by user id and
/// then device id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeysQueryResult {
    pub changed: BTreeMap<String, BTreeMap<String, Device>>,
}

impl KeysQueryResult {
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.changed.values().flat_map(|devices| devices.values())
    }
}

#[async_trait]
pub trait ClientSession: Send + Sync {
    /// User this session was created for, as given at login.
    fn user(&self) -> &str;

    /// Outbound HTTP client owned by this session, used to relay unmatched
    /// requests that carry its token.
    fn transport(&self) -> &reqwest::Client;

    async fn login(&self, password: &str, device_name: &str) -> Result<Upstream<LoginSuccess>>;

    async fn sync(
        &self,
        timeout: Option<&str>,
        filter: Option<&Map<String, Value>>,
    ) -> Result<Upstream<UpstreamResponse>>;

    fn should_upload_keys(&self) -> bool;

    async fn keys_upload(&self) -> Result<()>;

    fn should_query_keys(&self) -> bool;

    async fn keys_query(&self) -> Result<KeysQueryResult>;

    fn verify_device(&self, device: &Device);

    /// Replaces encrypted timeline events in a sync body with their plaintext.
    fn decrypt_sync_body(&self, body: Value) -> Value;

    /// Sends an event. Fails with [`SessionError::NoGroupSession`] when the
    /// room has no outbound group session yet.
    async fn send(
        &self,
        room_id: &str,
        event_type: &str,
        content: &Value,
        txn_id: &str,
    ) -> Result<UpstreamResponse>;

    async fn share_group_session(&self, room_id: &str) -> Result<()>;

    async fn close(&self);
}

/// Builds sessions bound to the configured homeserver.
pub trait SessionFactory: Send + Sync {
    fn create(&self, user: &str, device_id: Option<&str>) -> Result<Arc<dyn ClientSession>>;
}
