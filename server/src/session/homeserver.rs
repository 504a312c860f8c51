//! Transport-level session speaking the client-server API with `reqwest`.
//!
//! This collaborator tracks the sync position, device list changes and a
//! local device trust set. It holds no key material: sync bodies pass through
//! unchanged and sends never require a group session. An encrypting session
//! plugs into the proxy through [`SessionFactory`] instead.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use dashmap::DashSet;
use protocol::{
    endpoints, KeysQueryRequest, KeysQueryResponse, KeysUploadResponse, LoginResponse,
    PasswordLogin, SyncSummary,
};
use reqwest::Url;
use serde_json::{Map, Value};

use super::{
    ClientSession, Device, KeysQueryResult, LoginSuccess, Result, SessionError, SessionFactory,
    Upstream, UpstreamResponse,
};
use crate::proxy::transport::OutboundSettings;

pub struct HomeserverSessionFactory {
    homeserver: Url,
    outbound: OutboundSettings,
}

impl HomeserverSessionFactory {
    pub fn new(homeserver: Url, outbound: OutboundSettings) -> Self {
        Self {
            homeserver,
            outbound,
        }
    }
}

impl SessionFactory for HomeserverSessionFactory {
    fn create(&self, user: &str, device_id: Option<&str>) -> Result<Arc<dyn ClientSession>> {
        let client = self.outbound.build_client()?;
        Ok(Arc::new(HomeserverSession::new(
            self.homeserver.clone(),
            user,
            device_id,
            client,
        )))
    }
}

#[derive(Default)]
struct SessionState {
    access_token: Option<String>,
    user_id: Option<String>,
    device_id: Option<String>,
    next_batch: Option<String>,
    keys_uploaded: bool,
    one_time_key_counts: BTreeMap<String, u64>,
    // users whose device lists changed since the last key query
    pending_key_users: BTreeSet<String>,
    known_devices: HashMap<String, BTreeSet<String>>,
    closed: bool,
}

impl SessionState {
    fn token(&self) -> Result<String> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.access_token.clone().ok_or(SessionError::NotLoggedIn)
    }
}

pub struct HomeserverSession {
    homeserver: Url,
    user: String,
    client: reqwest::Client,
    state: Mutex<SessionState>,
    verified: DashSet<(String, String)>,
}

impl HomeserverSession {
    pub fn new(homeserver: Url, user: &str, device_id: Option<&str>, client: reqwest::Client) -> Self {
        Self {
            homeserver,
            user: user.to_string(),
            client,
            state: Mutex::new(SessionState {
                device_id: device_id.map(str::to_owned),
                ..SessionState::default()
            }),
            verified: DashSet::new(),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.state().access_token.clone()
    }

    pub fn device_id(&self) -> Option<String> {
        self.state().device_id.clone()
    }

    pub fn next_batch(&self) -> Option<String> {
        self.state().next_batch.clone()
    }

    pub fn one_time_key_counts(&self) -> BTreeMap<String, u64> {
        self.state().one_time_key_counts.clone()
    }

    pub fn is_verified(&self, user_id: &str, device_id: &str) -> bool {
        self.verified
            .contains(&(user_id.to_string(), device_id.to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state().closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.homeserver.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SessionError::Transport(format!("homeserver URL {} cannot be a base", self.homeserver))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn read_response(response: reqwest::Response) -> Result<UpstreamResponse> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(UpstreamResponse::new(status, body))
}

#[async_trait]
impl ClientSession for HomeserverSession {
    fn user(&self) -> &str {
        &self.user
    }

    fn transport(&self) -> &reqwest::Client {
        &self.client
    }

    async fn login(&self, password: &str, device_name: &str) -> Result<Upstream<LoginSuccess>> {
        self.ensure_open()?;
        let url = self.endpoint(endpoints::segments(endpoints::LOGIN_PATH))?;
        let device_id = self.device_id();
        let body = PasswordLogin::new(&self.user, password, device_id.as_deref(), device_name);

        let response = read_response(self.client.post(url).json(&body).send().await?).await?;
        if !response.is_success() {
            return Ok(Upstream::Failure(response));
        }

        let Ok(login) = serde_json::from_str::<LoginResponse>(&response.body) else {
            return Ok(Upstream::Failure(response));
        };

        {
            let mut state = self.state();
            state.access_token = Some(login.access_token.clone());
            state.device_id = Some(login.device_id);
            state.keys_uploaded = false;
            state.pending_key_users.insert(login.user_id.clone());
            state.user_id = Some(login.user_id);
        }

        Ok(Upstream::Success(LoginSuccess {
            access_token: login.access_token,
            response,
        }))
    }

    async fn sync(
        &self,
        timeout: Option<&str>,
        filter: Option<&Map<String, Value>>,
    ) -> Result<Upstream<UpstreamResponse>> {
        let (token, since) = {
            let state = self.state();
            (state.token()?, state.next_batch.clone())
        };

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(timeout) = timeout {
            query.push(("timeout", timeout.to_string()));
        }
        if let Some(filter) = filter {
            query.push(("filter", Value::Object(filter.clone()).to_string()));
        }
        if let Some(since) = since {
            query.push(("since", since));
        }

        let url = self.endpoint(endpoints::segments(endpoints::SYNC_PATH))?;
        let response = read_response(
            self.client
                .get(url)
                .bearer_auth(token)
                .query(&query)
                .send()
                .await?,
        )
        .await?;

        if !response.is_success() {
            return Ok(Upstream::Failure(response));
        }

        let Ok(summary) = serde_json::from_str::<SyncSummary>(&response.body) else {
            return Ok(Upstream::Failure(response));
        };

        let mut state = self.state();
        state.next_batch = Some(summary.next_batch);
        state
            .pending_key_users
            .extend(summary.device_lists.changed);
        for user in &summary.device_lists.left {
            state.known_devices.remove(user);
        }
        drop(state);

        Ok(Upstream::Success(response))
    }

    fn should_upload_keys(&self) -> bool {
        let state = self.state();
        !state.closed && state.access_token.is_some() && !state.keys_uploaded
    }

    async fn keys_upload(&self) -> Result<()> {
        let token = self.state().token()?;
        let url = self.endpoint(endpoints::segments(endpoints::KEYS_UPLOAD_PATH))?;
        let response = read_response(
            self.client
                .post(url)
                .bearer_auth(token)
                .json(&Map::new())
                .send()
                .await?,
        )
        .await?;

        if !response.is_success() {
            return Err(SessionError::Upstream(response));
        }

        let counts: KeysUploadResponse = serde_json::from_str(&response.body)
            .map_err(|e| SessionError::InvalidResponse(format!("keys upload: {e}")))?;

        let mut state = self.state();
        state.keys_uploaded = true;
        state.one_time_key_counts = counts.one_time_key_counts;
        Ok(())
    }

    fn should_query_keys(&self) -> bool {
        let state = self.state();
        !state.closed && !state.pending_key_users.is_empty()
    }

    async fn keys_query(&self) -> Result<KeysQueryResult> {
        let (token, users) = {
            let state = self.state();
            (state.token()?, state.pending_key_users.clone())
        };

        let url = self.endpoint(endpoints::segments(endpoints::KEYS_QUERY_PATH))?;
        let request = KeysQueryRequest::all_devices(users.iter().cloned());
        let response = read_response(
            self.client
                .post(url)
                .bearer_auth(token)
                .json(&request)
                .send()
                .await?,
        )
        .await?;

        if !response.is_success() {
            return Err(SessionError::Upstream(response));
        }

        let parsed: KeysQueryResponse = serde_json::from_str(&response.body)
            .map_err(|e| SessionError::InvalidResponse(format!("keys query: {e}")))?;

        let mut result = KeysQueryResult::default();
        let mut state = self.state();

        for user in users.iter().filter(|user| !parsed.failures.contains_key(*user)) {
            let mut devices = BTreeMap::new();
            let reported = parsed.device_keys.get(user);

            for (device_id, keys) in reported.into_iter().flatten() {
                devices.insert(
                    device_id.clone(),
                    Device {
                        user_id: user.clone(),
                        device_id: device_id.clone(),
                        display_name: keys
                            .unsigned
                            .as_ref()
                            .and_then(|unsigned| unsigned.device_display_name.clone()),
                        deleted: false,
                    },
                );
            }

            let known = state.known_devices.entry(user.clone()).or_default();
            let removed: Vec<String> = known
                .iter()
                .filter(|id| !devices.contains_key(*id))
                .cloned()
                .collect();
            for device_id in removed {
                self.verified.remove(&(user.clone(), device_id.clone()));
                devices.insert(
                    device_id.clone(),
                    Device {
                        user_id: user.clone(),
                        device_id,
                        display_name: None,
                        deleted: true,
                    },
                );
            }
            *known = reported
                .map(|reported| reported.keys().cloned().collect())
                .unwrap_or_default();

            state.pending_key_users.remove(user);
            if !devices.is_empty() {
                result.changed.insert(user.clone(), devices);
            }
        }

        Ok(result)
    }

    fn verify_device(&self, device: &Device) {
        self.verified
            .insert((device.user_id.clone(), device.device_id.clone()));
    }

    fn decrypt_sync_body(&self, body: Value) -> Value {
        body
    }

    async fn send(
        &self,
        room_id: &str,
        event_type: &str,
        content: &Value,
        txn_id: &str,
    ) -> Result<UpstreamResponse> {
        let token = self.state().token()?;
        let url = self.endpoint(endpoints::room_send_segments(room_id, event_type, txn_id))?;
        read_response(
            self.client
                .put(url)
                .bearer_auth(token)
                .json(content)
                .send()
                .await?,
        )
        .await
    }

    async fn share_group_session(&self, _room_id: &str) -> Result<()> {
        self.ensure_open()
    }

    async fn close(&self) {
        let mut state = self.state();
        if !state.closed {
            state.closed = true;
            log::debug!("Closed homeserver session for {}", self.user);
        }
    }
}
