#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::{web, App, HttpServer};
use async_trait::async_trait;
use serde_json::{Map, Value};
use veil::config::ProxyConfig;
use veil::proxy::ProxyState;
use veil::session::{
    ClientSession, Device, KeysQueryResult, LoginSuccess, SessionError, SessionFactory, Upstream,
    UpstreamResponse,
};

/// Calls observed by a [`ScriptedSession`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Login { password: String, device_name: String },
    Sync { timeout: Option<String>, filter: Option<Value> },
    KeysUpload,
    KeysQuery,
    Send { room_id: String, event_type: String, txn_id: String, content: Value },
    ShareGroupSession { room_id: String },
    Close,
}

/// Canned answers for a [`ScriptedSession`]. Queues fall back to a plain
/// success once empty.
#[derive(Default)]
pub struct Script {
    pub login: Option<Upstream<LoginSuccess>>,
    pub login_error: Option<SessionError>,
    pub sync: VecDeque<Upstream<UpstreamResponse>>,
    pub sync_error: Option<SessionError>,
    pub send: VecDeque<Result<UpstreamResponse, SessionError>>,
    pub upload_keys: bool,
    pub upload_fails: bool,
    pub keys_query: Option<KeysQueryResult>,
    pub keys_query_error: Option<SessionError>,
    pub share_error: Option<SessionError>,
}

pub struct ScriptedSession {
    user: String,
    client: reqwest::Client,
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
    verified: Mutex<Vec<(String, String)>>,
    closed: AtomicBool,
}

impl ScriptedSession {
    pub fn new(user: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            user: user.to_string(),
            client: reqwest::Client::new(),
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
            verified: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn verified(&self) -> Vec<(String, String)> {
        self.verified.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ClientSession for ScriptedSession {
    fn user(&self) -> &str {
        &self.user
    }

    fn transport(&self) -> &reqwest::Client {
        &self.client
    }

    async fn login(
        &self,
        password: &str,
        device_name: &str,
    ) -> Result<Upstream<LoginSuccess>, SessionError> {
        self.record(Call::Login {
            password: password.to_string(),
            device_name: device_name.to_string(),
        });
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script.login_error.take() {
            return Err(err);
        }
        Ok(script.login.take().unwrap_or_else(|| {
            Upstream::Failure(UpstreamResponse::new(
                403,
                r#"{"errcode":"M_FORBIDDEN","error":"Invalid password"}"#,
            ))
        }))
    }

    async fn sync(
        &self,
        timeout: Option<&str>,
        filter: Option<&Map<String, Value>>,
    ) -> Result<Upstream<UpstreamResponse>, SessionError> {
        self.record(Call::Sync {
            timeout: timeout.map(str::to_owned),
            filter: filter.map(|filter| Value::Object(filter.clone())),
        });
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script.sync_error.take() {
            return Err(err);
        }
        Ok(script
            .sync
            .pop_front()
            .unwrap_or_else(|| {
                Upstream::Success(UpstreamResponse::new(200, r#"{"next_batch":"s1"}"#))
            }))
    }

    fn should_upload_keys(&self) -> bool {
        self.script.lock().unwrap().upload_keys
    }

    async fn keys_upload(&self) -> Result<(), SessionError> {
        self.record(Call::KeysUpload);
        let mut script = self.script.lock().unwrap();
        if script.upload_fails {
            return Err(SessionError::Upstream(UpstreamResponse::new(
                500,
                r#"{"errcode":"M_UNKNOWN"}"#,
            )));
        }
        script.upload_keys = false;
        Ok(())
    }

    fn should_query_keys(&self) -> bool {
        let script = self.script.lock().unwrap();
        script.keys_query.is_some() || script.keys_query_error.is_some()
    }

    async fn keys_query(&self) -> Result<KeysQueryResult, SessionError> {
        self.record(Call::KeysQuery);
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script.keys_query_error.take() {
            return Err(err);
        }
        Ok(script.keys_query.take().unwrap_or_default())
    }

    fn verify_device(&self, device: &Device) {
        self.verified
            .lock()
            .unwrap()
            .push((device.user_id.clone(), device.device_id.clone()));
    }

    fn decrypt_sync_body(&self, mut body: Value) -> Value {
        if let Some(object) = body.as_object_mut() {
            object.insert("decrypted_by".to_string(), Value::from(self.user.clone()));
        }
        body
    }

    async fn send(
        &self,
        room_id: &str,
        event_type: &str,
        content: &Value,
        txn_id: &str,
    ) -> Result<UpstreamResponse, SessionError> {
        self.record(Call::Send {
            room_id: room_id.to_string(),
            event_type: event_type.to_string(),
            txn_id: txn_id.to_string(),
            content: content.clone(),
        });
        self.script
            .lock()
            .unwrap()
            .send
            .pop_front()
            .unwrap_or_else(|| Ok(UpstreamResponse::new(200, r#"{"event_id":"$event"}"#)))
    }

    async fn share_group_session(&self, room_id: &str) -> Result<(), SessionError> {
        self.record(Call::ShareGroupSession {
            room_id: room_id.to_string(),
        });
        match self.script.lock().unwrap().share_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn close(&self) {
        self.record(Call::Close);
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out pre-built sessions in order and remembers what was asked for.
#[derive(Default)]
pub struct ScriptedFactory {
    sessions: Mutex<VecDeque<Arc<ScriptedSession>>>,
    created: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedFactory {
    pub fn with_sessions(sessions: Vec<Arc<ScriptedSession>>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions.into()),
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> Vec<(String, Option<String>)> {
        self.created.lock().unwrap().clone()
    }
}

impl SessionFactory for ScriptedFactory {
    fn create(
        &self,
        user: &str,
        device_id: Option<&str>,
    ) -> Result<Arc<dyn ClientSession>, SessionError> {
        self.created
            .lock()
            .unwrap()
            .push((user.to_string(), device_id.map(str::to_owned)));
        let session = self
            .sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedSession::new(user, Script::default()));
        Ok(session)
    }
}

pub fn login_success(token: &str, user_id: &str) -> Upstream<LoginSuccess> {
    Upstream::Success(LoginSuccess {
        access_token: token.to_string(),
        response: UpstreamResponse::new(
            200,
            format!(
                r#"{{"access_token":"{}","user_id":"{}","device_id":"DEVICE"}}"#,
                token, user_id
            ),
        ),
    })
}

pub fn proxy_state(homeserver: &str, factory: Arc<ScriptedFactory>) -> web::Data<ProxyState> {
    proxy_state_with(ProxyConfig::new(homeserver), factory)
}

pub fn proxy_state_with(config: ProxyConfig, factory: Arc<ScriptedFactory>) -> web::Data<ProxyState> {
    web::Data::new(ProxyState::with_factory(&config, factory))
}

/// Address nothing listens on; requests reaching it fail.
pub const UNREACHABLE_HOMESERVER: &str = "http://127.0.0.1:9";

/// Starts a throwaway HTTP server standing in for the homeserver and returns
/// its base URL.
pub fn spawn_upstream<F>(configure: F) -> (String, SocketAddr)
where
    F: Fn(&mut web::ServiceConfig) + Clone + Send + 'static,
{
    let server = HttpServer::new(move || App::new().configure(configure.clone()))
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("Failed to bind upstream test server");

    let addr = server.addrs()[0];
    actix_rt::spawn(server.run());

    (format!("http://{}", addr), addr)
}
