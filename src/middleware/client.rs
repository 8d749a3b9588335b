use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, Extensions, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

/// Number of reverse proxies in front of the service.
///
/// Each trusted proxy appends the address it received the request from to
/// `X-Forwarded-For`, so the client address is `hops` entries from the right.
/// Anything further left was written by the client and is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedProxies(pub usize);

impl Default for TrustedProxies {
    fn default() -> Self {
        TrustedProxies(1)
    }
}

/// Caller address and agent, for lockout keys and the security log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_parts(headers: &HeaderMap, remote_addr: Option<SocketAddr>, proxies: TrustedProxies) -> Self {
        Self {
            ip: client_ip(headers, remote_addr, proxies),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.chars().take(255).collect()),
        }
    }
}

/// Client address as seen by the outermost trusted proxy, else the socket peer
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>, proxies: TrustedProxies) -> String {
    let socket_ip = || {
        remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    };

    if proxies.0 == 0 {
        return socket_ip();
    }

    if let Some(forwarded_for) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let hops: Vec<&str> = forwarded_for
            .split(',')
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();
        if !hops.is_empty() {
            return hops[hops.len().saturating_sub(proxies.0)].to_string();
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    socket_ip()
}

/// Address lookup for middleware that holds the whole request
pub fn client_ip_from_request(headers: &HeaderMap, extensions: &Extensions) -> String {
    let remote_addr = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let proxies = extensions.get::<TrustedProxies>().copied().unwrap_or_default();
    client_ip(headers, remote_addr, proxies)
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let proxies = parts.extensions.get::<TrustedProxies>().copied().unwrap_or_default();
        Ok(ClientInfo::from_parts(&parts.headers, remote_addr, proxies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_proxy_appended_hop_wins() {
        let addr: SocketAddr = "10.0.0.2:5000".parse().unwrap();
        let headers = forwarded("198.51.100.77, 203.0.113.7");
        assert_eq!(client_ip(&headers, Some(addr), TrustedProxies(1)), "203.0.113.7");
    }

    #[test]
    fn test_client_written_hops_do_not_change_key() {
        let one = forwarded("1.2.3.1, 203.0.113.5");
        let two = forwarded("1.2.3.2, 203.0.113.5");
        let three = forwarded("9.9.9.9, 8.8.8.8, 203.0.113.5");

        let keys: Vec<String> = [one, two, three]
            .iter()
            .map(|headers| client_ip(headers, None, TrustedProxies::default()))
            .collect();
        assert!(keys.iter().all(|key| key == "203.0.113.5"));
    }

    #[test]
    fn test_two_proxies_take_second_from_right() {
        let headers = forwarded("1.2.3.4, 203.0.113.9, 10.0.0.1");
        assert_eq!(client_ip(&headers, None, TrustedProxies(2)), "203.0.113.9");

        // shorter chain than configured: leftmost is the best available
        let headers = forwarded("203.0.113.9");
        assert_eq!(client_ip(&headers, None, TrustedProxies(2)), "203.0.113.9");
    }

    #[test]
    fn test_no_trusted_proxy_ignores_headers() {
        let mut headers = forwarded("203.0.113.7");
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));

        let addr: SocketAddr = "192.0.2.9:443".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(addr), TrustedProxies(0)), "192.0.2.9");
        assert_eq!(client_ip(&headers, None, TrustedProxies(0)), "unknown");
    }

    #[test]
    fn test_real_ip_then_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, None, TrustedProxies(1)), "198.51.100.2");

        let addr: SocketAddr = "192.0.2.9:443".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(addr), TrustedProxies(1)), "192.0.2.9");
    }

    #[test]
    fn test_user_agent_captured() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("VitaFit/2.1 (iOS)"));
        let info = ClientInfo::from_parts(&headers, None, TrustedProxies::default());
        assert_eq!(info.user_agent.as_deref(), Some("VitaFit/2.1 (iOS)"));
    }
}
