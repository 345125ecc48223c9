//! Client IP extraction utilities.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, connect_info::MockConnectInfo};

use crate::cli::ClientIpHeader;

/// Extract the client IP address for a request.
///
/// If `ip_header` is set, the address is taken from that header and an error
/// is returned when it is missing or malformed (no fallback to the socket).
/// Otherwise the peer address from `ConnectInfo` is used.
pub fn extract_client_ip(
    request: &Request,
    ip_header: Option<ClientIpHeader>,
) -> Result<String, &'static str> {
    match ip_header {
        Some(header) => {
            let value = request
                .headers()
                .get(header.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            header.parse(value)
        }
        None => {
            let extensions = request.extensions();
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0)
                .or_else(|| extensions.get::<MockConnectInfo<SocketAddr>>().map(|m| m.0))
                .map(|addr| addr.ip().to_string())
                .ok_or("No client IP available")
        }
    }
}
