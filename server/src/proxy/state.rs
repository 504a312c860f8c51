use std::sync::Arc;

use super::credentials::AccessToken;
use super::registry::{AnonymousTransport, RegisteredSession, SessionRegistry};
use crate::config::{DeviceTrustPolicy, ProxyConfig};
use crate::error::{ProxyError, Result};
use crate::session::{HomeserverSessionFactory, SessionFactory};

/// Everything the handlers of one proxy instance share.
pub struct ProxyState {
    homeserver: String,
    registry: SessionRegistry,
    factory: Arc<dyn SessionFactory>,
    trust_policy: DeviceTrustPolicy,
    device_display_name: String,
}

/// Where an unmatched request is sent from: the token's own session or the
/// shared anonymous transport.
pub enum ResolvedTransport {
    Session(Arc<RegisteredSession>),
    Anonymous(Arc<AnonymousTransport>),
}

impl ResolvedTransport {
    pub fn client(&self) -> &reqwest::Client {
        match self {
            ResolvedTransport::Session(entry) => entry.session().transport(),
            ResolvedTransport::Anonymous(transport) => transport.client(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, ResolvedTransport::Anonymous(_))
    }
}

impl ProxyState {
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let factory = HomeserverSessionFactory::new(config.homeserver_url()?, config.outbound());
        Ok(Self::with_factory(config, Arc::new(factory)))
    }

    pub fn with_factory(config: &ProxyConfig, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            homeserver: config.homeserver_base().to_string(),
            registry: SessionRegistry::new(config.outbound()),
            factory,
            trust_policy: config.device_trust,
            device_display_name: config.device_display_name.clone(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn factory(&self) -> &dyn SessionFactory {
        self.factory.as_ref()
    }

    pub fn trust_policy(&self) -> DeviceTrustPolicy {
        self.trust_policy
    }

    pub fn device_display_name(&self) -> &str {
        &self.device_display_name
    }

    /// Session for endpoints that require a registered token.
    pub fn authorized_session(&self, token: &AccessToken) -> Result<Arc<RegisteredSession>> {
        if token.is_empty() {
            return Err(ProxyError::MissingToken);
        }
        self.registry
            .lookup(token.as_str())
            .ok_or(ProxyError::UnknownToken)
    }

    pub fn resolve_transport(&self, token: &AccessToken) -> Result<ResolvedTransport> {
        match self.registry.lookup(token.as_str()) {
            Some(entry) => Ok(ResolvedTransport::Session(entry)),
            None => Ok(ResolvedTransport::Anonymous(
                self.registry.anonymous_transport()?,
            )),
        }
    }

    /// Homeserver URL for an inbound path and raw query string.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        match query.filter(|query| !query.is_empty()) {
            Some(query) => format!("{}{}?{}", self.homeserver, path, query),
            None => format!("{}{}", self.homeserver, path),
        }
    }
}
