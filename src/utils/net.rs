use std::net::IpAddr;

use crate::NetworkError;
use crate::Result;

/// Accepts `10.0.0.7`, `::1` and bracketed `[::1]`.
pub(crate) fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    let trimmed = host.trim_start_matches('[').trim_end_matches(']');
    trimmed.parse::<IpAddr>().ok().map(canonical_ip)
}

/// IPv4-mapped IPv6 addresses compare equal to their IPv4 form.
pub(crate) fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// Lower-cased hostname without the trailing root dot.
pub(crate) fn normalize_hostname(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Splits `host:port`, `[v6]:port` and the engine's `host port` reply form.
pub(crate) fn split_host_port(addr: &str) -> Result<(String, u16)> {
    let addr = addr.trim();
    let (host, port) = if let Some((host, port)) = addr.split_once(' ') {
        (host, port)
    } else if let Some(rest) = addr.strip_prefix('[') {
        let (host, port) = rest
            .split_once("]:")
            .ok_or_else(|| NetworkError::InvalidEndpoint(addr.to_string()))?;
        (host, port)
    } else {
        addr.rsplit_once(':')
            .ok_or_else(|| NetworkError::InvalidEndpoint(addr.to_string()))?
    };

    if host.is_empty() {
        return Err(NetworkError::InvalidEndpoint(addr.to_string()).into());
    }
    let port = port
        .trim()
        .parse::<u16>()
        .map_err(|_| NetworkError::InvalidEndpoint(addr.to_string()))?;
    Ok((host.to_string(), port))
}
