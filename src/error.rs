//! Proxmox VE client error types.

use std::fmt;

/// Unified error type for all client operations.
#[derive(Debug, Clone)]
pub enum ProxmoxError {
    /// Server certificate chain rejected by the configured trust policy
    TlsTrust(String),
    /// Connection-level failure (dial, timeout, I/O)
    Transport(String),
    /// Authentication failure (bad credentials, expired or unrecoverable session)
    Auth(String),
    /// Server returned a non-success HTTP status
    Api { status: u16, message: String },
    /// Response body did not match the expected shape
    Decode(String),
    /// Invalid inbound configuration
    Config(String),
}

impl ProxmoxError {
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::TlsTrust(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl fmt::Display for ProxmoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TlsTrust(msg) => write!(f, "TLS trust rejected: {}", msg),
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            Self::Api { status, message } => write!(f, "API error (HTTP {}): {}", status, message),
            Self::Decode(msg) => write!(f, "Decode error: {}", msg),
            Self::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ProxmoxError {}

impl From<reqwest::Error> for ProxmoxError {
    fn from(e: reqwest::Error) -> Self {
        if is_tls_rejection(&e) {
            Self::TlsTrust(e.to_string())
        } else if e.is_timeout() {
            Self::Transport(format!("request timed out: {}", e))
        } else if e.is_connect() {
            Self::Transport(format!("connection failed: {}", e))
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProxmoxError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<url::ParseError> for ProxmoxError {
    fn from(e: url::ParseError) -> Self {
        Self::Config(format!("invalid URL: {}", e))
    }
}

/// Whether a reqwest error originated in certificate verification.
///
/// A pin mismatch surfaces from rustls buried inside the hyper error
/// chain, so walk the sources before falling back to a message probe.
fn is_tls_rejection(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if err.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        source = err.source();
    }
    let msg = format!("{:?}", e);
    msg.contains("certificate") || msg.contains("Certificate") || msg.contains("NotValidForName")
}

/// Convenience Result alias.
pub type ProxmoxResult<T> = Result<T, ProxmoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_status_and_message() {
        let e = ProxmoxError::api(500, "internal error");
        assert_eq!(e.to_string(), "API error (HTTP 500): internal error");
    }

    #[test]
    fn serde_errors_map_to_decode() {
        let bad = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        assert!(matches!(ProxmoxError::from(bad), ProxmoxError::Decode(_)));
    }

    #[test]
    fn url_errors_map_to_config() {
        let bad = url::Url::parse("::not a url::").unwrap_err();
        assert!(matches!(ProxmoxError::from(bad), ProxmoxError::Config(_)));
    }
}
