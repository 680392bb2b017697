use axum::body::Body;
use axum::http::Request;
use axum::{extract::ConnectInfo, http::StatusCode, middleware::Next, response::Response};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, warn};

/// Check whether a peer address is on the allowlist.
/// IPv4-mapped IPv6 peers are compared by their IPv4 form.
pub(crate) fn is_allowed_client(peer: IpAddr, allowed: &[IpAddr]) -> bool {
    let peer = match peer {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(peer),
        v4 => v4,
    };
    allowed.contains(&peer)
}

/// Reject requests whose TCP peer is not an allowed client.
///
/// The allowlist is read from an `Extension<Arc<Vec<IpAddr>>>` layered
/// outside this middleware. Forwarded headers are ignored, only the socket
/// peer counts.
pub(crate) async fn allowed_clients_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let peer_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.ip());

    let allowed = req
        .extensions()
        .get::<Arc<Vec<IpAddr>>>()
        .cloned()
        .unwrap_or_default();

    match peer_ip {
        Some(ip) if is_allowed_client(ip, &allowed) => {
            debug!(peer = %ip, path = %req.uri().path(), "Allowed client request");
            Ok(next.run(req).await)
        }
        Some(ip) => {
            warn!(peer = %ip, path = %req.uri().path(), "Rejected request from unlisted client");
            Err(StatusCode::FORBIDDEN)
        }
        None => {
            warn!(path = %req.uri().path(), "Rejected request without peer address");
            Err(StatusCode::FORBIDDEN)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn allowlist() -> Vec<IpAddr> {
        vec!["192.168.0.50".parse().unwrap(), "::1".parse().unwrap()]
    }

    #[test]
    fn test_listed_clients_are_allowed() {
        assert!(is_allowed_client("192.168.0.50".parse().unwrap(), &allowlist()));
        assert!(is_allowed_client(IpAddr::V6(Ipv6Addr::LOCALHOST), &allowlist()));
    }

    #[test]
    fn test_unlisted_clients_are_rejected() {
        assert!(!is_allowed_client("192.168.0.51".parse().unwrap(), &allowlist()));
        assert!(!is_allowed_client(IpAddr::V4(Ipv4Addr::LOCALHOST), &allowlist()));
        assert!(!is_allowed_client("10.0.0.1".parse().unwrap(), &[]));
    }

    #[test]
    fn test_ipv4_mapped_peer_matches_ipv4_entry() {
        let mapped = IpAddr::V6(Ipv4Addr::new(192, 168, 0, 50).to_ipv6_mapped());
        assert!(is_allowed_client(mapped, &allowlist()));
    }
}
