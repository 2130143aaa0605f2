//! HTTP transport for the Proxmox VE API.
//!
//! One reqwest client per `ProxmoxClient`, built once from the configured
//! trust policy and timeouts. Pinned trust modes install the custom
//! verifier from [`crate::tls`] through a preconfigured rustls config;
//! `SystemDefault` keeps reqwest's platform root store. Connection pooling
//! therefore never crosses trust policies.

use log::{debug, warn};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ProxmoxError, ProxmoxResult};
use crate::session::TicketExchange;
use crate::tls;
use crate::types::{AuthScheme, ClientConfig, Credentials, TicketGrant};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// ─── Request / Response values ──────────────────────────────────────────────

/// One logical API call: method, `/api2/json/…` path, query and body.
/// Built per call, immutable once dispatched.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Only idempotent requests are eligible for the single transport
    /// retry.
    pub idempotent: bool,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            idempotent: true,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::non_idempotent(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::non_idempotent(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::non_idempotent(Method::DELETE, path)
    }

    fn non_idempotent(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            idempotent: false,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Mutating requests carry the CSRF prevention header.
    pub fn mutating(&self) -> bool {
        self.method != Method::GET
    }
}

/// Raw response before typed decoding.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Percent-encode one path segment (volume ids and snapshot names may
/// contain `:` and `/`).
pub(crate) fn path_segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

// ─── Transport ──────────────────────────────────────────────────────────────

/// Configured HTTPS transport. Cheap to share by reference; all methods
/// take `&self`.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build the transport from connection configuration. The TLS policy
    /// is locked in here and cannot change for the life of the client.
    pub fn new(config: &ClientConfig) -> ProxmoxResult<Self> {
        if config.host.trim().is_empty() {
            return Err(ProxmoxError::config("host cannot be empty"));
        }

        let base_url = format!("https://{}:{}", config.host, config.port);
        url::Url::parse(&base_url)?;

        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs));

        if let Some(tls_config) = tls::pinned_tls_config(config)? {
            builder = builder.use_preconfigured_tls(tls_config);
        }

        let client = builder
            .build()
            .map_err(|e| ProxmoxError::transport(format!("failed to build HTTP client: {}", e)))?;

        debug!("Proxmox transport ready for {}", base_url);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request with the given auth headers already resolved.
    ///
    /// Idempotent requests get exactly one immediate retry on a
    /// connection-level failure; HTTP error statuses are never retried
    /// here, and neither is a trust rejection.
    pub async fn send(
        &self,
        req: &ApiRequest,
        headers: &[(String, String)],
    ) -> ProxmoxResult<RawResponse> {
        match self.dispatch(req, headers).await {
            Err(ProxmoxError::Transport(first)) if req.idempotent => {
                warn!(
                    "retrying idempotent {} {} once after transport failure: {}",
                    req.method, req.path, first
                );
                self.dispatch(req, headers).await
            }
            other => other,
        }
    }

    async fn dispatch(
        &self,
        req: &ApiRequest,
        headers: &[(String, String)],
    ) -> ProxmoxResult<RawResponse> {
        let url = format!("{}{}", self.base_url, req.path);
        debug!("Proxmox API → {} {}", req.method, url);

        let mut builder = self
            .client
            .request(req.method.clone(), &url)
            .header("Accept", "application/json");

        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        debug!("Proxmox API ← HTTP {} ({} bytes)", status, body.len());
        Ok(RawResponse { status, body })
    }
}

// ─── Envelope decoding ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    errors: Option<HashMap<String, serde_json::Value>>,
}

/// Decode the `{"data": …}` envelope, mapping non-success statuses to
/// typed errors first so a server-reported failure never shows up as a
/// decode problem.
pub(crate) fn decode_envelope<T: DeserializeOwned>(raw: RawResponse) -> ProxmoxResult<T> {
    if !raw.status.is_success() {
        let message = server_message(&raw.body, raw.status);
        if raw.status == StatusCode::UNAUTHORIZED {
            return Err(ProxmoxError::auth(message));
        }
        return Err(ProxmoxError::api(raw.status.as_u16(), message));
    }

    serde_json::from_str::<Envelope<T>>(&raw.body)
        .map(|e| e.data)
        .map_err(|e| {
            ProxmoxError::decode(format!(
                "unexpected response shape: {} — body: {}",
                e,
                &raw.body[..raw.body.len().min(300)]
            ))
        })
}

/// Best-effort extraction of the server's own error message.
fn server_message(body: &str, status: StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message {
            let message = message.trim();
            if !message.is_empty() {
                return message.to_string();
            }
        }
        if let Some(errors) = parsed.errors {
            if !errors.is_empty() {
                let mut parts: Vec<String> = errors
                    .iter()
                    .map(|(field, detail)| format!("{}: {}", field, detail))
                    .collect();
                parts.sort();
                return parts.join("; ");
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status)
    } else {
        trimmed[..trimmed.len().min(300)].to_string()
    }
}

// ─── Login exchange ─────────────────────────────────────────────────────────

#[async_trait]
impl TicketExchange for HttpTransport {
    async fn request_ticket(
        &self,
        credentials: &Credentials,
        scheme: &AuthScheme,
    ) -> ProxmoxResult<TicketGrant> {
        let (username, realm, password) = match credentials {
            Credentials::Password {
                username,
                realm,
                password,
            } => (username, realm, password),
            Credentials::ApiToken { .. } => {
                return Err(ProxmoxError::config(
                    "API token credentials do not use the ticket endpoint",
                ));
            }
        };

        debug!("requesting auth ticket for {}@{}", username, realm);

        let req = ApiRequest::post(&scheme.ticket_path).json(serde_json::json!({
            "username": username,
            "password": password,
            "realm": realm,
        }));

        // The login itself goes out bare; auth headers do not exist yet.
        let raw = self.dispatch(&req, &[]).await?;

        match raw.status {
            StatusCode::UNAUTHORIZED => {
                return Err(ProxmoxError::auth("invalid username or password"))
            }
            StatusCode::FORBIDDEN => {
                return Err(ProxmoxError::auth("access forbidden — check user permissions"))
            }
            status if !status.is_success() => {
                return Err(ProxmoxError::auth(format!(
                    "login failed: {}",
                    server_message(&raw.body, status)
                )));
            }
            _ => {}
        }

        let grant: TicketGrant = decode_envelope(raw)?;
        if grant.ticket.trim().is_empty() {
            return Err(ProxmoxError::auth("server returned an empty authentication ticket"));
        }

        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::TrustPolicy;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn get_is_idempotent_and_not_mutating() {
        let req = ApiRequest::get("/api2/json/nodes");
        assert!(req.idempotent);
        assert!(!req.mutating());
    }

    #[test]
    fn writes_are_mutating_and_never_idempotent() {
        for req in [
            ApiRequest::post("/p"),
            ApiRequest::put("/p"),
            ApiRequest::delete("/p"),
        ] {
            assert!(!req.idempotent);
            assert!(req.mutating());
        }
    }

    #[test]
    fn path_segment_escapes_volume_ids() {
        assert_eq!(
            path_segment("local:backup/vzdump-qemu-100.vma.zst"),
            "local%3Abackup%2Fvzdump-qemu-100.vma.zst"
        );
    }

    #[test]
    fn envelope_unwraps_data() {
        let nodes: Vec<String> = decode_envelope(raw(200, r#"{"data": ["pve1", "pve2"]}"#)).unwrap();
        assert_eq!(nodes, vec!["pve1", "pve2"]);
    }

    #[test]
    fn http_500_with_json_body_is_api_error_not_decode() {
        let result: ProxmoxResult<Vec<String>> = decode_envelope(raw(
            500,
            r#"{"data": null, "message": "storage 'local-lvm' is not online"}"#,
        ));
        match result.unwrap_err() {
            ProxmoxError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "storage 'local-lvm' is not online");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn field_errors_are_joined_into_the_message() {
        let result: ProxmoxResult<Vec<String>> = decode_envelope(raw(
            400,
            r#"{"data": null, "errors": {"vmid": "invalid format", "name": "required"}}"#,
        ));
        match result.unwrap_err() {
            ProxmoxError::Api { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("vmid"));
                assert!(message.contains("name"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn http_401_maps_to_auth() {
        let result: ProxmoxResult<Vec<String>> =
            decode_envelope(raw(401, "authentication failure"));
        assert!(matches!(result.unwrap_err(), ProxmoxError::Auth(_)));
    }

    #[test]
    fn malformed_success_body_is_decode_error() {
        let result: ProxmoxResult<Vec<String>> = decode_envelope(raw(200, r#"{"data": 42}"#));
        assert!(matches!(result.unwrap_err(), ProxmoxError::Decode(_)));
    }

    #[test]
    fn empty_host_is_a_config_error() {
        let cfg = ClientConfig::new("   ");
        assert!(matches!(
            HttpTransport::new(&cfg).unwrap_err(),
            ProxmoxError::Config(_)
        ));
    }

    #[test]
    fn transport_builds_for_pinned_policy() {
        let cfg = ClientConfig::new("pve.lab.local").with_trust(TrustPolicy::Fingerprint(
            crate::tls::CertFingerprint::of_der(b"cert"),
        ));
        let transport = HttpTransport::new(&cfg).unwrap();
        assert_eq!(transport.base_url(), "https://pve.lab.local:8006");
    }

    #[tokio::test]
    async fn refused_connection_surfaces_as_transport_error() {
        let cfg = ClientConfig::new("127.0.0.1").with_port(1);
        let transport = HttpTransport::new(&cfg).unwrap();
        let err = transport
            .send(&ApiRequest::get("/api2/json/version"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProxmoxError::Transport(_)));
    }
}
