//! TLS trust evaluation.
//!
//! Hypervisor API endpoints routinely present self-signed or
//! operator-issued certificates, so next to the platform trust store the
//! client supports pinning a single certificate by SHA-256 fingerprint or
//! by exact DER match. Pinning replaces chain building, it never bypasses
//! verification: a presented certificate that does not match the pin
//! terminates the handshake.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::DigitallySignedStruct;
use sha2::{Digest, Sha256};

use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::ClientConfig;

// ─── Fingerprint ────────────────────────────────────────────────────────────

/// SHA-256 digest of a certificate in DER form.
///
/// Parses the colon-separated hex `pvenode cert info` prints as well as
/// bare hex.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CertFingerprint([u8; 32]);

impl CertFingerprint {
    pub fn of_der(der: &[u8]) -> Self {
        Self(Sha256::digest(der).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for CertFingerprint {
    type Err = ProxmoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| *c != ':' && !c.is_whitespace()).collect();
        let bytes = hex::decode(&compact)
            .map_err(|e| ProxmoxError::config(format!("invalid fingerprint hex: {}", e)))?;
        let digest: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            ProxmoxError::config(format!(
                "fingerprint must be 32 bytes (SHA-256), got {}",
                b.len()
            ))
        })?;
        Ok(Self(digest))
    }
}

impl fmt::Display for CertFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CertFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertFingerprint({})", self)
    }
}

// ─── Trust policy ───────────────────────────────────────────────────────────

/// How server certificates are evaluated. Fixed at client construction so
/// no two requests of one client ever run under different validation rules.
#[derive(Debug, Clone)]
pub enum TrustPolicy {
    /// Platform trust store, standard chain and hostname verification.
    SystemDefault,
    /// Accept only a leaf certificate whose SHA-256 digest matches.
    Fingerprint(CertFingerprint),
    /// Accept only an exact DER match of the pinned certificate.
    Certificate(Vec<u8>),
}

impl TrustPolicy {
    /// Pin the first certificate found in a PEM document.
    pub fn certificate_from_pem(pem: &[u8]) -> ProxmoxResult<Self> {
        let mut reader = std::io::Cursor::new(pem);
        let der = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or_else(|| ProxmoxError::config("no certificate found in PEM data"))?
            .map_err(|e| ProxmoxError::config(format!("unreadable PEM certificate: {}", e)))?;
        Ok(Self::Certificate(der.as_ref().to_vec()))
    }

    pub fn is_pinned(&self) -> bool {
        !matches!(self, Self::SystemDefault)
    }
}

// ─── Pinned verifier ────────────────────────────────────────────────────────

/// rustls verifier for the pinned trust modes.
///
/// `expected_host` is `None` only when the caller set the explicit
/// `accept_any_hostname` opt-out.
#[derive(Debug)]
pub(crate) struct PinnedVerifier {
    policy: TrustPolicy,
    expected_host: Option<ServerName<'static>>,
}

impl PinnedVerifier {
    pub(crate) fn new(policy: TrustPolicy, expected_host: Option<ServerName<'static>>) -> Self {
        Self {
            policy,
            expected_host,
        }
    }
}

impl ServerCertVerifier for PinnedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match &self.policy {
            TrustPolicy::Fingerprint(pin) => {
                let presented = CertFingerprint::of_der(end_entity.as_ref());
                if presented != *pin {
                    return Err(rustls::Error::General(format!(
                        "certificate fingerprint mismatch: pinned {}, presented {}",
                        pin, presented
                    )));
                }
            }
            TrustPolicy::Certificate(der) => {
                if end_entity.as_ref() != der.as_slice() {
                    return Err(rustls::Error::General(
                        "presented certificate does not match the pinned certificate".to_string(),
                    ));
                }
            }
            // SystemDefault never reaches this verifier.
            TrustPolicy::SystemDefault => {
                return Err(rustls::Error::General(
                    "pinned verifier configured without a pin".to_string(),
                ));
            }
        }

        if let Some(expected) = &self.expected_host {
            if server_name != expected {
                return Err(rustls::Error::InvalidCertificate(
                    rustls::CertificateError::NotValidForName,
                ));
            }
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ED25519,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
        ]
    }
}

/// Build the rustls config for pinned modes; `None` means the transport
/// should use reqwest's stock TLS stack (platform roots).
pub(crate) fn pinned_tls_config(config: &ClientConfig) -> ProxmoxResult<Option<rustls::ClientConfig>> {
    if !config.trust.is_pinned() {
        return Ok(None);
    }

    let expected_host = if config.accept_any_hostname {
        log::warn!(
            "hostname verification disabled for pinned trust on {} — explicit opt-out",
            config.host
        );
        None
    } else {
        Some(
            ServerName::try_from(config.host.clone())
                .map_err(|e| ProxmoxError::config(format!("invalid host name: {}", e)))?,
        )
    };

    let verifier = PinnedVerifier::new(config.trust.clone(), expected_host);
    let tls = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(Some(tls))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify(
        verifier: &PinnedVerifier,
        der: &[u8],
        host: &str,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let cert = CertificateDer::from(der.to_vec());
        let name = ServerName::try_from(host.to_string()).unwrap();
        verifier.verify_server_cert(
            &cert,
            &[],
            &name,
            &[],
            UnixTime::since_unix_epoch(std::time::Duration::from_secs(1_750_000_000)),
        )
    }

    fn pinned(der: &[u8], host: Option<&str>) -> PinnedVerifier {
        PinnedVerifier::new(
            TrustPolicy::Fingerprint(CertFingerprint::of_der(der)),
            host.map(|h| ServerName::try_from(h.to_string()).unwrap()),
        )
    }

    #[test]
    fn fingerprint_parses_colon_hex_and_bare_hex() {
        let fp = CertFingerprint::of_der(b"dummy-cert-der");
        let colon = fp.to_string();
        assert_eq!(colon.parse::<CertFingerprint>().unwrap(), fp);
        assert_eq!(
            colon.replace(':', "").to_lowercase().parse::<CertFingerprint>().unwrap(),
            fp
        );
    }

    #[test]
    fn fingerprint_rejects_wrong_length_and_bad_chars() {
        assert!("AB:CD".parse::<CertFingerprint>().is_err());
        assert!("ZZ".repeat(32).parse::<CertFingerprint>().is_err());
    }

    #[test]
    fn matching_fingerprint_is_accepted() {
        let der = b"server-cert-der-bytes";
        let v = pinned(der, Some("pve.lab.local"));
        assert!(verify(&v, der, "pve.lab.local").is_ok());
    }

    #[test]
    fn mismatched_fingerprint_is_rejected() {
        let v = pinned(b"expected-cert", Some("pve.lab.local"));
        let err = verify(&v, b"some-other-cert", "pve.lab.local").unwrap_err();
        assert!(format!("{:?}", err).contains("fingerprint mismatch"));
    }

    #[test]
    fn hostname_mismatch_is_rejected_even_with_matching_pin() {
        let der = b"server-cert-der-bytes";
        let v = pinned(der, Some("pve.lab.local"));
        assert!(verify(&v, der, "evil.example.com").is_err());
    }

    #[test]
    fn hostname_check_skipped_only_on_explicit_opt_out() {
        let der = b"server-cert-der-bytes";
        let v = pinned(der, None);
        assert!(verify(&v, der, "whatever.example.com").is_ok());
    }

    #[test]
    fn exact_certificate_pin_requires_identical_der() {
        let v = PinnedVerifier::new(
            TrustPolicy::Certificate(b"exact-der".to_vec()),
            None,
        );
        assert!(verify(&v, b"exact-der", "h").is_ok());
        assert!(verify(&v, b"exact-der-2", "h").is_err());
    }

    #[test]
    fn pem_pin_extracts_first_certificate() {
        // Minimal PEM wrapping of arbitrary DER bytes.
        let pem = b"-----BEGIN CERTIFICATE-----\nMIIBCg==\n-----END CERTIFICATE-----\n";
        let policy = TrustPolicy::certificate_from_pem(pem).unwrap();
        match policy {
            TrustPolicy::Certificate(der) => assert!(!der.is_empty()),
            other => panic!("unexpected policy {:?}", other),
        }
    }

    #[test]
    fn system_default_builds_no_custom_config() {
        let cfg = ClientConfig::new("pve.lab.local");
        assert!(pinned_tls_config(&cfg).unwrap().is_none());
    }

    #[test]
    fn pinned_policy_builds_custom_config() {
        let cfg = ClientConfig::new("pve.lab.local")
            .with_trust(TrustPolicy::Fingerprint(CertFingerprint::of_der(b"x")));
        assert!(pinned_tls_config(&cfg).unwrap().is_some());
    }
}
