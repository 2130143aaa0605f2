//! # pvemobile-core — Secure Proxmox VE API Client Core
//!
//! Typed async client for a Proxmox-VE-style hypervisor control plane,
//! built for endpoints that present self-signed or operator-issued
//! certificates.
//!
//! ## Capabilities
//!
//! - **Trust evaluation** — platform trust store, or pinning a single
//!   certificate by SHA-256 fingerprint / exact DER, without ever
//!   disabling verification
//! - **Session lifecycle** — ticket + CSRF token acquisition, cached
//!   validity with clock-skew tolerance, transparent single-flight
//!   re-authentication, stateless API-token auth
//! - **Nodes** — inventory, status
//! - **QEMU VMs** — list, status, create, delete, lifecycle actions,
//!   migrate, snapshots
//! - **LXC containers** — list, status, create, delete, lifecycle
//!   actions, migrate
//! - **Storage** — pools, content listings, volume removal, vzdump
//!   backups
//! - **Tasks** — listing, UPID status tracking, abort
//! - **Cluster** — membership status, resource inventory
//! - **Access** — user management
//!
//! ## Architecture
//!
//! - `types` — configuration, credentials, session and payload types
//! - `error` — typed error taxonomy (`ProxmoxError`)
//! - `tls` — trust policy and the pinned certificate verifier
//! - `transport` — the configured reqwest client, request/response values
//! - `session` — ticket state machine and single-flight refresh
//! - `nodes`, `qemu`, `lxc`, `storage`, `tasks`, `cluster`, `access` —
//!   the typed API surface
//! - `client` — the assembled long-lived client object
//!
//! ## Example
//!
//! ```no_run
//! use pvemobile_core::{ClientConfig, Credentials, ProxmoxClient, TrustPolicy};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pin = "AB:CD:EF:…your node's SHA-256 fingerprint…".parse();
//! let config = ClientConfig::new("pve.lab.local").with_trust(TrustPolicy::Fingerprint(pin?));
//! let client = ProxmoxClient::new(config, Credentials::password("root", "pam", "secret"))?;
//!
//! client.login().await?;
//! for node in client.nodes().list().await? {
//!     println!("{} is {}", node.node, node.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod client;
pub mod cluster;
pub mod error;
pub mod lxc;
pub mod nodes;
pub mod qemu;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod tls;
pub mod transport;
pub mod types;

// Re-exports
pub use client::ProxmoxClient;
pub use error::{ProxmoxError, ProxmoxResult};
pub use session::{SessionManager, TicketExchange};
pub use tls::{CertFingerprint, TrustPolicy};
pub use transport::{ApiRequest, HttpTransport, RawResponse};
pub use types::*;
