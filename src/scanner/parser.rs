// Certificate parser - structured metadata from a DER-encoded certificate

use crate::model::{Observation, ObservationSource};
use crate::Result;
use chrono::{DateTime, Utc};
use openssl::hash::MessageDigest;
use serde::{Deserialize, Serialize};
use x509_parser::objects::oid2sn;
use x509_parser::prelude::*;

/// Structured metadata extracted from a presented certificate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertInfo {
    /// Hostname the scan was requested for
    pub hostname: String,
    pub port: u16,
    /// Subject CN, falling back to the requested hostname
    pub common_name: String,
    /// Issuer CN, falling back to the full issuer DN
    pub issuer: String,
    /// Full issuer distinguished name
    pub issuer_full: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Subject Alternative Names; empty when the extension is absent
    pub san_list: Vec<String>,
    /// Uppercase hexadecimal
    pub serial_number: String,
    /// Uppercase hex SHA-256 over the DER bytes
    pub fingerprint_sha256: String,
    pub signature_algorithm: String,
    pub public_key_size: Option<u32>,
    /// Human-readable key usage roles, e.g. "Digital Signature, Server Authentication"
    pub key_usage: Option<String>,
    pub is_self_signed: bool,
    pub is_ca_certificate: bool,
    /// PEM encoding of the presented certificate
    pub pem_data: String,
}

impl CertInfo {
    /// Convert to a transient observation for reconciliation/persistence
    pub fn to_observation(&self) -> Observation {
        Observation {
            common_name: self.common_name.clone(),
            issuer: self.issuer.clone(),
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            serial_number: Some(self.serial_number.clone()),
            fingerprint_sha256: Some(self.fingerprint_sha256.clone()),
            signature_algorithm: Some(self.signature_algorithm.clone()),
            public_key_size: self.public_key_size,
            san_list: self.san_list.clone(),
            is_self_signed: self.is_self_signed,
            is_ca_certificate: self.is_ca_certificate,
            key_usage: self.key_usage.clone(),
            friendly_name: None,
            template_name: None,
            pem_data: Some(self.pem_data.clone()),
            environment: None,
            source: ObservationSource::Scan {
                hostname: self.hostname.clone(),
                port: self.port,
            },
            parse_error: None,
        }
    }
}

/// Parse a DER-encoded certificate presented by `hostname:port`
pub fn parse_certificate(der_bytes: &[u8], hostname: &str, port: u16) -> Result<CertInfo> {
    let (_, cert) = X509Certificate::from_der(der_bytes)
        .map_err(|e| anyhow::anyhow!("failed to parse certificate: {:?}", e))?;

    // Subject CN with fallback to the requested hostname
    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| hostname.to_string());

    // Issuer CN with fallback to the full DN string
    let issuer_full = cert.issuer().to_string();
    let issuer = cert
        .issuer()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| issuer_full.clone());

    // Subject Alternative Names; an absent extension is an empty list
    let mut san_list = Vec::new();
    if let Ok(Some(ext)) = cert.get_extension_unique(&oid_registry::OID_X509_EXT_SUBJECT_ALT_NAME)
    {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for name in &san.general_names {
                match name {
                    GeneralName::DNSName(dns) => san_list.push(dns.to_string()),
                    GeneralName::IPAddress(ip) => san_list.push(format!("IP:{}", hex::encode(ip))),
                    _ => {}
                }
            }
        }
    }

    // Self-signed: issuer DN byte-equal to subject DN
    let is_self_signed = cert.subject().as_raw() == cert.issuer().as_raw();

    // CA flag from basic constraints; false when the extension is absent
    let is_ca_certificate = cert
        .basic_constraints()
        .map(|bc| bc.map(|ext| ext.value.ca).unwrap_or(false))
        .unwrap_or(false);

    let key_usage = key_usage_text(&cert);

    // key_size() returns bits for the RSA modulus / EC field
    let public_key_size = match cert.public_key().parsed() {
        Ok(x509_parser::public_key::PublicKey::RSA(rsa)) => Some(rsa.key_size() as u32),
        Ok(x509_parser::public_key::PublicKey::EC(ec)) => Some(ec.key_size() as u32),
        _ => None,
    };

    let serial_number = format!("{:X}", cert.serial);

    let digest = openssl::hash::hash(MessageDigest::sha256(), der_bytes)
        .map_err(|e| anyhow::anyhow!("failed to compute SHA-256 fingerprint: {}", e))?;
    let fingerprint_sha256 = hex::encode_upper(digest.as_ref());

    let signature_algorithm = signature_algorithm_name(&cert);

    let valid_from =
        DateTime::from_timestamp(cert.validity().not_before.to_datetime().unix_timestamp(), 0);
    let valid_until =
        DateTime::from_timestamp(cert.validity().not_after.to_datetime().unix_timestamp(), 0);

    let pem_data = ::pem::encode(&::pem::Pem::new("CERTIFICATE", der_bytes.to_vec()));

    Ok(CertInfo {
        hostname: hostname.to_string(),
        port,
        common_name,
        issuer,
        issuer_full,
        valid_from,
        valid_until,
        san_list,
        serial_number,
        fingerprint_sha256,
        signature_algorithm,
        public_key_size,
        key_usage,
        is_self_signed,
        is_ca_certificate,
        pem_data,
    })
}

/// Human-readable key usage text from the standard KU bits and the
/// server-auth/client-auth EKU OIDs. None when neither extension says
/// anything.
fn key_usage_text(cert: &X509Certificate) -> Option<String> {
    let mut roles = Vec::new();

    if let Ok(Some(ext)) = cert.get_extension_unique(&oid_registry::OID_X509_EXT_KEY_USAGE) {
        if let ParsedExtension::KeyUsage(ku) = ext.parsed_extension() {
            if ku.digital_signature() {
                roles.push("Digital Signature");
            }
            if ku.key_encipherment() {
                roles.push("Key Encipherment");
            }
            if ku.key_cert_sign() {
                roles.push("Certificate Sign");
            }
        }
    }

    if let Ok(Some(ext)) =
        cert.get_extension_unique(&oid_registry::OID_X509_EXT_EXTENDED_KEY_USAGE)
    {
        if let ParsedExtension::ExtendedKeyUsage(eku) = ext.parsed_extension() {
            if eku.server_auth {
                roles.push("Server Authentication");
            }
            if eku.client_auth {
                roles.push("Client Authentication");
            }
        }
    }

    if roles.is_empty() {
        None
    } else {
        Some(roles.join(", "))
    }
}

/// Short name of the signature algorithm, falling back to the dotted OID
fn signature_algorithm_name(cert: &X509Certificate) -> String {
    let oid = &cert.signature_algorithm.algorithm;
    oid2sn(oid, x509_parser::objects::oid_registry())
        .map(|sn| sn.to_string())
        .unwrap_or_else(|_| oid.to_string())
}
