use std::net::SocketAddr;

use http::HeaderMap;

/// Resolves the client address of a request.
///
/// The first entry of `x-forwarded-for` is the original client when the
/// service runs behind a proxy; otherwise the socket peer is used.
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(client_ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return client_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
