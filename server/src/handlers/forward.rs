use actix_web::{http::header, web, HttpRequest, HttpResponse};

use super::status_code;
use crate::{
    error::{ProxyError, Result},
    proxy::{AccessToken, ProxyState},
};

/// Headers that describe a single hop rather than the message itself. They
/// are dropped in both directions; on requests this also drops Host so the
/// client sets the homeserver's.
const HOP_HEADERS: [&str; 6] = [
    "host",
    "connection",
    "keep-alive",
    "content-length",
    "transfer-encoding",
    "upgrade",
];

/// Relays any request not handled by a dedicated endpoint.
pub async fn forward(
    req: HttpRequest,
    body: web::Bytes,
    token: AccessToken,
    state: web::Data<ProxyState>,
) -> Result<HttpResponse> {
    let transport = state.resolve_transport(&token)?;
    let url = state.upstream_url(req.uri().path(), req.uri().query());
    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| ProxyError::Internal(format!("Unsupported method: {}", e)))?;

    log::debug!(
        "Forwarding {} {} ({})",
        req.method(),
        req.uri().path(),
        if transport.is_anonymous() { "anonymous" } else { "session" }
    );

    let mut request = transport.client().request(method, url);
    for (name, value) in req.headers() {
        if HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        request = request.header(name.as_str(), value.as_bytes());
    }

    let response = request.body(body).send().await?;

    let status = response.status().as_u16();
    let headers: Vec<(String, Vec<u8>)> = response
        .headers()
        .iter()
        .filter(|(name, _)| !HOP_HEADERS.contains(&name.as_str()))
        .map(|(name, value)| (name.as_str().to_owned(), value.as_bytes().to_vec()))
        .collect();
    let body = response.bytes().await?;

    let mut builder = HttpResponse::build(status_code(status));
    for (name, value) in headers {
        let (Ok(name), Ok(value)) = (
            header::HeaderName::from_bytes(name.as_bytes()),
            header::HeaderValue::from_bytes(&value),
        ) else {
            continue;
        };
        builder.append_header((name, value));
    }

    Ok(builder.body(body))
}
