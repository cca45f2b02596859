//! Request extractors.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, header, request::Parts};
use sesame_core::ClientMeta;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Client metadata recorded with refresh tokens: `User-Agent` and the caller's IP.
///
/// The IP is the first `X-Forwarded-For` entry, falling back to the peer address.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo(pub ClientMeta);

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = header_str(&parts.headers, header::USER_AGENT.as_str());
        let ip = header_str(&parts.headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            });

        Ok(ClientInfo(ClientMeta::new(user_agent, ip)))
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
