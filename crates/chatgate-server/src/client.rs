//! Client address resolution for rate-limit keys

use std::net::SocketAddr;

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

pub const UNKNOWN_CLIENT: &str = "unknown";

/// Headers set by proxies in front of the service, most specific first.
const PROXY_HEADERS: &[&str] = &["cf-connecting-ip", "x-real-ip"];

/// The address requests are counted against. Forwarding headers are only
/// honoured when the deployment sits behind a trusted proxy.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(addr) = forwarded_address(headers) {
            return addr;
        }
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_address(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    PROXY_HEADERS
        .iter()
        .find_map(|name| header(name))
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|list| list.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        })
        .map(str::to_string)
}

/// Truncated hash of the address for logs
pub fn fingerprint(address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address.as_bytes());
    let hex_hash = hex::encode(hasher.finalize());
    hex_hash[..12].to_string()
}
