use actix_web::{web, HttpResponse};
use protocol::LoginRequest;

use super::relay;
use crate::{
    error::{ProxyError, Result},
    proxy::ProxyState,
    session::Upstream,
};

pub async fn login(body: web::Bytes, state: web::Data<ProxyState>) -> Result<HttpResponse> {
    let request = LoginRequest::parse(&body).map_err(|e| {
        log::debug!("Rejected login body: {}", e);
        ProxyError::LoginNotJson
    })?;

    let device_name = request
        .initial_device_display_name
        .as_deref()
        .unwrap_or_else(|| state.device_display_name());

    log::info!("Login attempt for user: {}", request.user);

    let session = state
        .factory()
        .create(&request.user, request.device_id.as_deref())?;

    let outcome = session.login(&request.password, device_name).await;
    match outcome {
        Ok(Upstream::Success(success)) => {
            log::info!("Successful login for user: {}", request.user);
            state.registry().register(success.access_token, session);
            Ok(relay(success.response))
        }
        Ok(Upstream::Failure(response)) => {
            log::warn!(
                "Homeserver rejected login for user: {} (status {})",
                request.user,
                response.status
            );
            session.close().await;
            Ok(relay(response))
        }
        Err(err) => {
            session.close().await;
            Err(err.into())
        }
    }
}
