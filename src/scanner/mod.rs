// TLS Scanner - live handshake against a target, structured metadata out

pub mod batch;
pub mod enrich;
pub mod parser;

pub use batch::{scan_many, HostScanResult};
pub use parser::CertInfo;

use crate::error::ScanError;
use crate::utils::network;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// TLS certificate scanner.
///
/// With `verify_chain` false the peer certificate is accepted without trust
/// validation - the explicitly insecure mode used for internal inventories
/// full of self-signed and internal-CA certificates.
#[derive(Debug, Clone)]
pub struct CertScanner {
    timeout: Duration,
    verify_chain: bool,
}

impl CertScanner {
    pub fn new(timeout: Duration, verify_chain: bool) -> Self {
        Self {
            timeout,
            verify_chain,
        }
    }

    /// Handshake with `hostname:port` and parse the presented certificate.
    ///
    /// Every failure mode comes back as a `ScanError` carrying the target
    /// identity; this function does not panic on remote misbehavior.
    pub async fn scan(&self, hostname: &str, port: u16) -> Result<CertInfo, ScanError> {
        let target = format!("{}:{}", hostname, port);

        let ips = network::resolve_hostname(hostname).await.map_err(|e| {
            ScanError::DnsResolution {
                target: target.clone(),
                detail: e.to_string(),
            }
        })?;
        let addr = std::net::SocketAddr::new(ips[0], port);

        let stream = match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                return Err(ScanError::ConnectionRefused { target });
            }
            Ok(Err(e)) => {
                return Err(ScanError::Unexpected {
                    target,
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ScanError::Timeout {
                    target,
                    timeout: self.timeout,
                });
            }
        };

        let connector = tokio_rustls::TlsConnector::from(Arc::new(self.client_config()));
        let server_name = ServerName::try_from(hostname.to_string()).map_err(|_| {
            ScanError::Unexpected {
                target: target.clone(),
                detail: format!("invalid server name: {}", hostname),
            }
        })?;

        let tls_stream = match timeout(self.timeout, connector.connect(server_name, stream)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ScanError::TlsHandshake {
                    target,
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ScanError::Timeout {
                    target,
                    timeout: self.timeout,
                });
            }
        };

        let (_io, connection) = tls_stream.into_inner();
        let leaf_der = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| ScanError::TlsHandshake {
                target: target.clone(),
                detail: "no certificate presented by server".to_string(),
            })?
            .to_vec();

        parser::parse_certificate(&leaf_der, hostname, port).map_err(|e| {
            ScanError::Unexpected {
                target,
                detail: e.to_string(),
            }
        })
    }

    fn client_config(&self) -> ClientConfig {
        if self.verify_chain {
            let mut root_store = RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        } else {
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        }
    }
}

/// No-op certificate verifier for the explicit insecure mode
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
