//! The assembled Proxmox VE client.

use log::info;
use serde::de::DeserializeOwned;

use crate::access::AccessApi;
use crate::cluster::ClusterApi;
use crate::error::ProxmoxResult;
use crate::lxc::LxcApi;
use crate::nodes::NodesApi;
use crate::qemu::QemuApi;
use crate::session::SessionManager;
use crate::storage::StorageApi;
use crate::tasks::TasksApi;
use crate::transport::{decode_envelope, ApiRequest, HttpTransport};
use crate::types::{AuthState, ClientConfig, Credentials, VersionInfo};

/// One long-lived client per endpoint: trust policy, transport, session
/// and API surface assembled in dependency order at construction.
///
/// All methods take `&self`; callers may issue operations concurrently.
/// Dropping the client tears it down — pooled connections are closed and
/// the session ticket is discarded with it. Nothing is process-global;
/// two clients with different trust policies share no state.
#[derive(Debug)]
pub struct ProxmoxClient {
    transport: HttpTransport,
    session: SessionManager,
}

impl ProxmoxClient {
    /// Build a client from connection configuration and login material.
    /// No network traffic happens here; the first login is either the
    /// explicit [`login`](Self::login) call or lazily on first use.
    pub fn new(config: ClientConfig, credentials: Credentials) -> ProxmoxResult<Self> {
        let session = SessionManager::new(
            credentials,
            config.auth.clone(),
            config.ticket_lifetime_secs,
        );
        let transport = HttpTransport::new(&config)?;
        info!("Proxmox client configured for {}", transport.base_url());
        Ok(Self { transport, session })
    }

    // ── Session lifecycle ───────────────────────────────────────────

    /// Perform the login exchange now instead of on first request.
    pub async fn login(&self) -> ProxmoxResult<()> {
        self.session.authenticate(&self.transport).await
    }

    /// Clear the session and return to Unauthenticated.
    pub async fn logout(&self) {
        self.session.logout().await;
    }

    /// Observable auth state for UI collaborators.
    pub async fn auth_state(&self) -> AuthState {
        self.session.auth_state().await
    }

    // ── Version ─────────────────────────────────────────────────────

    /// API version through the authorized path.
    pub async fn version(&self) -> ProxmoxResult<VersionInfo> {
        self.execute(ApiRequest::get("/api2/json/version")).await
    }

    /// Unauthenticated reachability probe; the version endpoint is the
    /// one Proxmox serves without credentials.
    pub async fn probe_version(&self) -> ProxmoxResult<VersionInfo> {
        let raw = self
            .transport
            .send(&ApiRequest::get("/api2/json/version"), &[])
            .await?;
        decode_envelope(raw)
    }

    // ── API surface ─────────────────────────────────────────────────

    pub fn nodes(&self) -> NodesApi<'_> {
        NodesApi::new(self)
    }

    pub fn qemu(&self) -> QemuApi<'_> {
        QemuApi::new(self)
    }

    pub fn lxc(&self) -> LxcApi<'_> {
        LxcApi::new(self)
    }

    pub fn storage(&self) -> StorageApi<'_> {
        StorageApi::new(self)
    }

    pub fn tasks(&self) -> TasksApi<'_> {
        TasksApi::new(self)
    }

    pub fn cluster(&self) -> ClusterApi<'_> {
        ClusterApi::new(self)
    }

    pub fn access(&self) -> AccessApi<'_> {
        AccessApi::new(self)
    }

    // ── Internal ────────────────────────────────────────────────────

    /// Authorize, send, decode. Every surface operation funnels through
    /// here, so no request leaves without valid auth material.
    pub(crate) async fn execute<T: DeserializeOwned>(&self, req: ApiRequest) -> ProxmoxResult<T> {
        let headers = self
            .session
            .authorize(&self.transport, req.mutating())
            .await?;
        let raw = self.transport.send(&req, &headers).await?;
        decode_envelope(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxmoxError;
    use crate::tls::{CertFingerprint, TrustPolicy};

    fn client() -> ProxmoxClient {
        ProxmoxClient::new(
            ClientConfig::new("pve.lab.local"),
            Credentials::password("root", "pam", "secret"),
        )
        .unwrap()
    }

    #[test]
    fn construction_rejects_empty_host() {
        let result = ProxmoxClient::new(
            ClientConfig::new(""),
            Credentials::password("root", "pam", "secret"),
        );
        assert!(matches!(result.unwrap_err(), ProxmoxError::Config(_)));
    }

    #[test]
    fn construction_accepts_pinned_policy() {
        let config = ClientConfig::new("10.0.0.5")
            .with_trust(TrustPolicy::Fingerprint(CertFingerprint::of_der(b"pin")));
        assert!(ProxmoxClient::new(config, Credentials::password("root", "pam", "pw")).is_ok());
    }

    #[tokio::test]
    async fn fresh_client_is_unauthenticated() {
        assert_eq!(client().auth_state().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn api_token_client_is_immediately_authenticated() {
        let c = ProxmoxClient::new(
            ClientConfig::new("pve.lab.local"),
            Credentials::api_token("automation", "pve", "ci", "secret"),
        )
        .unwrap();
        assert_eq!(c.auth_state().await, AuthState::Authenticated);
    }
}
