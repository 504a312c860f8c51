use std::collections::HashMap;
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};

const BEARER_PREFIX: &str = "Bearer ";

/// Credential presented by the client, possibly empty.
///
/// The `access_token` query parameter wins over the `Authorization` header.
/// From the header only a leading literal `"Bearer "` is stripped; the scheme
/// is not validated, so a raw token in the header is taken as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn from_http_request(req: &HttpRequest) -> Self {
        let from_query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
            .ok()
            .and_then(|query| query.get("access_token").cloned())
            .filter(|token| !token.is_empty());

        if let Some(token) = from_query {
            return Self(token);
        }

        let from_header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.strip_prefix(BEARER_PREFIX).unwrap_or(value))
            .unwrap_or_default();

        Self(from_header.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromRequest for AccessToken {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_http_request(req)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn no_credential_yields_empty_token() {
        let req = TestRequest::get().uri("/_matrix/client/r0/sync").to_http_request();
        let token = AccessToken::from_http_request(&req);
        assert!(token.is_empty());
        assert_eq!(token.as_str(), "");
    }

    #[test]
    fn query_parameter_wins_over_header() {
        let req = TestRequest::get()
            .uri("/x?access_token=from-query")
            .insert_header((header::AUTHORIZATION, "Bearer from-header"))
            .to_http_request();
        assert_eq!(AccessToken::from_http_request(&req).as_str(), "from-query");
    }

    #[test]
    fn empty_query_parameter_falls_back_to_header() {
        let req = TestRequest::get()
            .uri("/x?access_token=")
            .insert_header((header::AUTHORIZATION, "Bearer from-header"))
            .to_http_request();
        assert_eq!(AccessToken::from_http_request(&req).as_str(), "from-header");
    }

    #[test]
    fn query_parameter_is_url_decoded() {
        let req = TestRequest::get()
            .uri("/x?access_token=a%2Bb&since=s1")
            .to_http_request();
        assert_eq!(AccessToken::from_http_request(&req).as_str(), "a+b");
    }

    #[test]
    fn header_without_bearer_prefix_is_taken_verbatim() {
        let req = TestRequest::get()
            .uri("/x")
            .insert_header((header::AUTHORIZATION, "raw-token"))
            .to_http_request();
        assert_eq!(AccessToken::from_http_request(&req).as_str(), "raw-token");
    }

    #[test]
    fn only_one_leading_prefix_is_stripped() {
        let req = TestRequest::get()
            .uri("/x")
            .insert_header((header::AUTHORIZATION, "Bearer Bearer abc"))
            .to_http_request();
        assert_eq!(AccessToken::from_http_request(&req).as_str(), "Bearer abc");
    }
}
