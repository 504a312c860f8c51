use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::Value;

use super::{relay, status_code};
use crate::{
    config::DeviceTrustPolicy,
    error::Result,
    proxy::{AccessToken, ProxyState},
    session::{ClientSession, KeysQueryResult, SessionError, Upstream},
};

#[derive(Debug, Default)]
struct SyncParams {
    filter: Option<String>,
    timeout: Option<String>,
}

impl SyncParams {
    /// Repeated keys keep their first value.
    fn from_query(query: &str) -> Self {
        let pairs = web::Query::<Vec<(String, String)>>::from_query(query)
            .map(web::Query::into_inner)
            .unwrap_or_default();

        let first = |key: &str| {
            pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        };

        Self {
            filter: first("filter"),
            timeout: first("timeout"),
        }
    }
}

pub async fn sync(
    req: HttpRequest,
    token: AccessToken,
    state: web::Data<ProxyState>,
) -> Result<HttpResponse> {
    let entry = state.authorized_session(&token)?;
    let session = entry.session();

    let params = SyncParams::from_query(req.query_string());
    let filter = protocol::decode_filter(params.filter.as_deref());

    let response = match session.sync(params.timeout.as_deref(), filter.as_ref()).await? {
        Upstream::Success(response) => response,
        Upstream::Failure(response) => return Ok(relay(response)),
    };

    let _guard = entry.lock().await;

    if session.should_upload_keys() {
        if let Err(err) = session.keys_upload().await {
            log::warn!("Key upload for {} failed: {}", session.user(), err);
        }
    }

    if session.should_query_keys() {
        let result = session.keys_query().await?;
        apply_trust_policy(state.trust_policy(), session, &result);
    }

    let body: Value = serde_json::from_str(&response.body)
        .map_err(|e| SessionError::InvalidResponse(format!("sync body: {}", e)))?;
    let decrypted = session.decrypt_sync_body(body);

    Ok(HttpResponse::build(status_code(response.status)).json(decrypted))
}

/// Verifies every non-deleted device in `result` when the policy trusts on
/// first use. Returns how many devices were verified.
pub fn apply_trust_policy(
    policy: DeviceTrustPolicy,
    session: &dyn ClientSession,
    result: &KeysQueryResult,
) -> usize {
    if policy == DeviceTrustPolicy::Manual {
        return 0;
    }

    let mut verified = 0;
    for device in result.devices().filter(|device| !device.deleted) {
        log::info!(
            "Automatically verifying device {} of {}",
            device.device_id,
            device.user_id
        );
        session.verify_device(device);
        verified += 1;
    }
    verified
}
