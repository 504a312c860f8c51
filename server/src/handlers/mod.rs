pub mod forward;
pub mod login;
pub mod send;
pub mod sync;

use actix_web::{http::StatusCode, web, HttpResponse};
use protocol::endpoints;

use crate::session::UpstreamResponse;

pub use forward::forward;
pub use login::login;
pub use send::{send_message, send_with_recovery};
pub use sync::{apply_trust_policy, sync};

/// Route table: the three transformed endpoints match on method and path,
/// everything else, including other methods on those paths, is forwarded.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(endpoints::LOGIN_PATH)
            .route(web::post().to(login))
            .default_service(web::to(forward)),
    )
    .service(
        web::resource(endpoints::SYNC_PATH)
            .route(web::get().to(sync))
            .default_service(web::to(forward)),
    )
    .service(
        web::resource(endpoints::ROOM_SEND_PATTERN)
            .route(web::put().to(send_message))
            .default_service(web::to(forward)),
    )
    .default_service(web::to(forward));
}

/// Homeserver response passed back unchanged.
pub fn relay(response: UpstreamResponse) -> HttpResponse {
    HttpResponse::build(status_code(response.status))
        .content_type("application/json")
        .body(response.body)
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}
