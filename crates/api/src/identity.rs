//! Viewer identity for view-count deduplication.
//!
//! Logged-in readers are tracked by user id so they are deduplicated across
//! changing networks. Anonymous readers are tracked by best-effort client
//! address: readers behind a shared IP undercount, and spoofed proxy headers
//! can overcount. Both are accepted.
//!
//! ```ignore
//! async fn get_article(viewer: Viewer, Path(id): Path<String>, ...) -> ... {
//!     if state.stores.views.can_count_view(&viewer.0, &id) { ... }
//! }
//! ```

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

/// Identity used when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Authenticated user, inserted into request extensions by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}

/// Where a client address can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpSource {
    /// First entry of `X-Forwarded-For`.
    ForwardedFor,
    /// `X-Real-IP` as set by nginx-style proxies.
    RealIp,
    /// Peer address of the TCP connection.
    Connection,
}

/// Lookup order for anonymous clients; first hit wins.
const IP_SOURCES: &[IpSource] = &[IpSource::ForwardedFor, IpSource::RealIp, IpSource::Connection];

impl IpSource {
    fn lookup(self, headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<String> {
        match self {
            IpSource::ForwardedFor => header_value(headers, "x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from),
            IpSource::RealIp => header_value(headers, "x-real-ip")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from),
            IpSource::Connection => remote.map(|addr| addr.ip().to_string()),
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Best-effort client address, or [`UNKNOWN_CLIENT`].
pub fn client_address(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    IP_SOURCES
        .iter()
        .find_map(|source| source.lookup(headers, remote))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Identity to deduplicate views by: the user id when logged in, otherwise
/// the client address. Never empty.
pub fn resolve_identity(
    user_id: Option<&str>,
    headers: &HeaderMap,
    remote: Option<SocketAddr>,
) -> String {
    match user_id.filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => client_address(headers, remote),
    }
}

/// Extractor yielding the requester identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer(pub String);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .extensions
            .get::<AuthenticatedUser>()
            .map(|user| user.id.as_str());
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Viewer(resolve_identity(user_id, &parts.headers, remote)))
    }
}
