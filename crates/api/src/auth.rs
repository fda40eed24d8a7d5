//! Bearer-token authentication and client identification helpers.

use std::net::IpAddr;

use actix_web::{http::header::AUTHORIZATION, HttpRequest};
use diskwala_domain::model::UserRecord;
use diskwala_domain::services::token_digest;
use diskwala_domain::storage::AuthTokenStore;

use crate::handlers::ApiError;
use crate::state::AppState;

const TOKEN_SCHEMES: [&str; 2] = ["Token", "Bearer"];

/// Resolves the `Authorization` header to an active user.
pub async fn authenticate(state: &AppState, req: &HttpRequest) -> Result<UserRecord, ApiError> {
    let key = bearer_key(req).ok_or(ApiError::Unauthorized(
        "authentication credentials were not provided",
    ))?;
    let user = state
        .storage()
        .find_user_by_token(&token_digest(key))
        .await?
        .ok_or(ApiError::Unauthorized("invalid token"))?;
    if !user.is_active {
        return Err(ApiError::Unauthorized("user inactive or deleted"));
    }
    Ok(user)
}

/// Like [`authenticate`], additionally requiring the superuser flag.
pub async fn require_superuser(
    state: &AppState,
    req: &HttpRequest,
) -> Result<UserRecord, ApiError> {
    let user = authenticate(state, req).await?;
    if !user.is_superuser {
        return Err(ApiError::Forbidden(
            "you do not have permission to perform this action",
        ));
    }
    Ok(user)
}

fn bearer_key(req: &HttpRequest) -> Option<&str> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = header.trim().split_once(' ')?;
    let key = key.trim();
    let known = TOKEN_SCHEMES
        .iter()
        .any(|expected| scheme.eq_ignore_ascii_case(expected));
    (known && !key.is_empty()).then_some(key)
}

/// Client address used for de-duplication. Forwarding headers
/// (`Forwarded: for=`, then the first `X-Forwarded-For` hop) are only
/// honoured when the peer is a trusted proxy or the request arrived over a
/// unix socket; any other peer is identified by its own address.
pub fn client_ip(req: &HttpRequest, trusted_proxies: &[IpAddr]) -> String {
    let peer = req.peer_addr().map(|addr| addr.ip());
    if let Some(ip) = peer.filter(|ip| !trusted_proxies.contains(ip)) {
        return ip.to_string();
    }
    req.connection_info()
        .realip_remote_addr()
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn accepts_token_and_bearer_schemes() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Token abc123"))
            .to_http_request();
        assert_eq!(bearer_key(&req), Some("abc123"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "bearer   xyz"))
            .to_http_request();
        assert_eq!(bearer_key(&req), Some("xyz"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic Zm9vOmJhcg=="))
            .to_http_request();
        assert_eq!(bearer_key(&req), None);
    }

    fn proxies() -> Vec<IpAddr> {
        vec!["10.0.0.1".parse().unwrap()]
    }

    #[test]
    fn forwarded_for_is_used_behind_a_trusted_proxy() {
        let req = TestRequest::default()
            .peer_addr("10.0.0.1:443".parse().unwrap())
            .insert_header(("X-Forwarded-For", "1.2.3.4, 10.0.0.1"))
            .to_http_request();
        assert_eq!(client_ip(&req, &proxies()), "1.2.3.4");

        let req = TestRequest::default()
            .peer_addr("10.0.0.1:443".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req, &proxies()), "10.0.0.1");
    }

    #[test]
    fn untrusted_peers_cannot_spoof_forwarded_for() {
        let req = TestRequest::default()
            .peer_addr("9.8.7.6:4321".parse().unwrap())
            .insert_header(("X-Forwarded-For", "1.2.3.4"))
            .to_http_request();
        assert_eq!(client_ip(&req, &proxies()), "9.8.7.6");

        let req = TestRequest::default()
            .peer_addr("9.8.7.6:4321".parse().unwrap())
            .insert_header(("Forwarded", "for=5.6.7.8"))
            .to_http_request();
        assert_eq!(client_ip(&req, &[]), "9.8.7.6");
    }

    #[test]
    fn unix_socket_requests_use_forwarded_for() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "1.2.3.4, 10.0.0.1"))
            .to_http_request();
        assert_eq!(client_ip(&req, &[]), "1.2.3.4");

        let req = TestRequest::default().to_http_request();
        assert_eq!(client_ip(&req, &[]), "unknown");
    }
}
