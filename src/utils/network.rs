// Network utilities - target parsing and DNS resolution

use anyhow::{Context, Result};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::{IpAddr, SocketAddr};

/// Scan target: hostname, port and resolved addresses
#[derive(Debug, Clone)]
pub struct Target {
    pub hostname: String,
    pub port: u16,
    pub ip_addresses: Vec<IpAddr>,
}

impl Target {
    /// Parse target from string (host, host:port, or URL) and resolve it
    pub async fn parse(input: &str, default_port: u16) -> Result<Self> {
        let (hostname, port) = split_host_port(input, default_port)?;
        let ip_addresses = resolve_hostname(&hostname).await?;

        Ok(Self {
            hostname,
            port,
            ip_addresses,
        })
    }

    /// Get all socket addresses
    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        self.ip_addresses
            .iter()
            .map(|ip| SocketAddr::new(*ip, self.port))
            .collect()
    }

    /// Target identity for diagnostics
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Split an input string into hostname and port without resolving
pub fn split_host_port(input: &str, default_port: u16) -> Result<(String, u16)> {
    if input.contains("://") {
        // URL format (https://example.com:8443)
        let url = url::Url::parse(input)?;
        let host = url.host_str().context("no hostname in URL")?.to_string();
        let port = url.port().unwrap_or(default_port);
        return Ok((host, port));
    }

    if let Some((host, port_str)) = input.rsplit_once(':') {
        // host:port format; a second colon means a bare IPv6 literal
        if !host.contains(':') {
            let port = port_str
                .parse::<u16>()
                .with_context(|| format!("invalid port in {}", input))?;
            return Ok((host.to_string(), port));
        }
    }

    Ok((input.to_string(), default_port))
}

/// Resolve hostname to IP addresses
pub async fn resolve_hostname(hostname: &str) -> Result<Vec<IpAddr>> {
    // Already an IP address?
    if let Ok(ip) = hostname.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let response = resolver
        .lookup_ip(hostname)
        .await
        .with_context(|| format!("DNS lookup failed for {}", hostname))?;

    let ips: Vec<IpAddr> = response.iter().collect();

    if ips.is_empty() {
        anyhow::bail!("no IP addresses found for {}", hostname);
    }

    Ok(ips)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_host_port("example.com", 443).unwrap(),
            ("example.com".to_string(), 443)
        );
        assert_eq!(
            split_host_port("example.com:8443", 443).unwrap(),
            ("example.com".to_string(), 8443)
        );
        assert_eq!(
            split_host_port("https://example.com", 443).unwrap(),
            ("example.com".to_string(), 443)
        );
        assert_eq!(
            split_host_port("https://example.com:9443/path", 443).unwrap(),
            ("example.com".to_string(), 9443)
        );
    }

    #[test]
    fn test_split_host_port_invalid_port() {
        assert!(split_host_port("example.com:notaport", 443).is_err());
    }

    #[test]
    fn test_ipv6_literal_keeps_default_port() {
        assert_eq!(
            split_host_port("::1", 443).unwrap(),
            ("::1".to_string(), 443)
        );
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let ips = resolve_hostname("127.0.0.1").await.unwrap();
        assert_eq!(ips, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }
}
