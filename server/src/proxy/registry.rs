use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use super::transport::OutboundSettings;
use crate::session::ClientSession;

/// A session registered under an access token.
///
/// The lock serializes work that touches the session's encryption state for
/// one token; plain network waits such as the sync long-poll happen outside it.
pub struct RegisteredSession {
    session: Arc<dyn ClientSession>,
    crypto_lock: AsyncMutex<()>,
}

impl RegisteredSession {
    fn new(session: Arc<dyn ClientSession>) -> Self {
        Self {
            session,
            crypto_lock: AsyncMutex::new(()),
        }
    }

    pub fn session(&self) -> &dyn ClientSession {
        self.session.as_ref()
    }

    pub async fn lock(&self) -> AsyncMutexGuard<'_, ()> {
        self.crypto_lock.lock().await
    }
}

/// Shared transport for requests without a recognised token.
pub struct AnonymousTransport {
    client: reqwest::Client,
}

impl AnonymousTransport {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    // access_token -> session
    sessions: Arc<DashMap<String, Arc<RegisteredSession>>>,
    anonymous: Arc<Mutex<Option<Arc<AnonymousTransport>>>>,
    outbound: OutboundSettings,
}

impl SessionRegistry {
    pub fn new(outbound: OutboundSettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            anonymous: Arc::new(Mutex::new(None)),
            outbound,
        }
    }

    /// Inserts the session, replacing whatever was registered for the token.
    pub fn register(&self, access_token: String, session: Arc<dyn ClientSession>) {
        let user = session.user().to_string();
        let previous = self
            .sessions
            .insert(access_token, Arc::new(RegisteredSession::new(session)));

        if previous.is_some() {
            log::debug!("Replaced an existing session for {}", user);
        }
        log::info!("Registered session for {}", user);
    }

    pub fn lookup(&self, access_token: &str) -> Option<Arc<RegisteredSession>> {
        if access_token.is_empty() {
            return None;
        }
        self.sessions
            .get(access_token)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the shared anonymous transport, building it on first use.
    pub fn anonymous_transport(&self) -> Result<Arc<AnonymousTransport>, reqwest::Error> {
        let mut slot = self.anonymous_slot();
        if let Some(transport) = slot.as_ref() {
            return Ok(Arc::clone(transport));
        }

        let transport = Arc::new(AnonymousTransport {
            client: self.outbound.build_client()?,
        });
        *slot = Some(Arc::clone(&transport));
        log::debug!("Created anonymous upstream transport");

        Ok(transport)
    }

    pub fn has_anonymous_transport(&self) -> bool {
        self.anonymous_slot().is_some()
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Closes every registered session, then drops the anonymous transport.
    /// Returns the number of sessions closed; calling it again is a no-op.
    pub async fn drain_all(&self) -> usize {
        let tokens: Vec<String> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut closed = 0;
        for token in tokens {
            if let Some((_, entry)) = self.sessions.remove(&token) {
                entry.session().close().await;
                closed += 1;
            }
        }

        if self.anonymous_slot().take().is_some() {
            log::debug!("Released anonymous upstream transport");
        }

        if closed > 0 {
            log::info!("Closed {} sessions", closed);
        }

        closed
    }

    fn anonymous_slot(&self) -> MutexGuard<'_, Option<Arc<AnonymousTransport>>> {
        match self.anonymous.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
