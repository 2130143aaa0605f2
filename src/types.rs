//! Data structures and configuration for the Proxmox VE client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::tls::TrustPolicy;

// ─── Connection / Config ────────────────────────────────────────────────────

/// Configuration for connecting to a Proxmox VE node or cluster endpoint.
///
/// Supplied once at client construction; the trust policy and timeouts are
/// fixed for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hostname or IP of the Proxmox VE API endpoint.
    pub host: String,
    /// API port (default 8006).
    pub port: u16,
    /// TLS trust policy applied to every connection.
    pub trust: TrustPolicy,
    /// Skip the hostname check in pinned modes. Explicit opt-out, never
    /// the default; ignored for `TrustPolicy::SystemDefault`.
    pub accept_any_hostname: bool,
    /// TCP connect timeout in seconds (default 10).
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds (default 30).
    pub request_timeout_secs: u64,
    /// Wire names for the authentication exchange.
    pub auth: AuthScheme,
    /// Ticket validity in seconds. Proxmox VE issues 2-hour tickets and
    /// does not return an expiry field, so the client tracks it (default
    /// 7200).
    pub ticket_lifetime_secs: i64,
}

impl ClientConfig {
    /// Config for `host` with every other field at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            trust: TrustPolicy::SystemDefault,
            accept_any_hostname: false,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            auth: AuthScheme::default(),
            ticket_lifetime_secs: default_ticket_lifetime(),
        }
    }

    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

fn default_port() -> u16 {
    8006
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    30
}
fn default_ticket_lifetime() -> i64 {
    7200
}

/// Wire names used by the authentication exchange.
///
/// Defaults match Proxmox VE; other control planes with the same API shape
/// can rename the cookie/header/path without touching the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthScheme {
    /// Login endpoint path.
    #[serde(default = "default_ticket_path")]
    pub ticket_path: String,
    /// Cookie carrying the auth ticket.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Header carrying the anti-CSRF token on mutating requests.
    #[serde(default = "default_csrf_header")]
    pub csrf_header: String,
    /// Header carrying stateless API-token auth.
    #[serde(default = "default_token_header")]
    pub token_header: String,
    /// Scheme prefix inside the token header value.
    #[serde(default = "default_token_prefix")]
    pub token_prefix: String,
}

impl Default for AuthScheme {
    fn default() -> Self {
        Self {
            ticket_path: default_ticket_path(),
            cookie_name: default_cookie_name(),
            csrf_header: default_csrf_header(),
            token_header: default_token_header(),
            token_prefix: default_token_prefix(),
        }
    }
}

fn default_ticket_path() -> String {
    "/api2/json/access/ticket".to_string()
}
fn default_cookie_name() -> String {
    "PVEAuthCookie".to_string()
}
fn default_csrf_header() -> String {
    "CSRFPreventionToken".to_string()
}
fn default_token_header() -> String {
    "Authorization".to_string()
}
fn default_token_prefix() -> String {
    "PVEAPIToken".to_string()
}

// ─── Credentials / Session ──────────────────────────────────────────────────

/// Login material. Held in memory for ticket refresh, never persisted by
/// the client.
#[derive(Clone)]
pub enum Credentials {
    /// Interactive password login against a realm (`user@pam`, `user@pve`, …).
    Password {
        username: String,
        realm: String,
        password: String,
    },
    /// Stateless API token (`user@realm!tokenid=secret`). No ticket
    /// lifecycle; the token is attached to every request.
    ApiToken {
        user: String,
        realm: String,
        token_id: String,
        secret: String,
    },
}

impl Credentials {
    pub fn password(
        username: impl Into<String>,
        realm: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::Password {
            username: username.into(),
            realm: realm.into(),
            password: password.into(),
        }
    }

    pub fn api_token(
        user: impl Into<String>,
        realm: impl Into<String>,
        token_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self::ApiToken {
            user: user.into(),
            realm: realm.into(),
            token_id: token_id.into(),
            secret: secret.into(),
        }
    }

    /// `user@realm` as the API expects it.
    pub fn login_name(&self) -> String {
        match self {
            Self::Password {
                username, realm, ..
            } => format!("{}@{}", username, realm),
            Self::ApiToken { user, realm, .. } => format!("{}@{}", user, realm),
        }
    }
}

// Secrets never reach log output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password {
                username, realm, ..
            } => write!(f, "Credentials::Password({}@{})", username, realm),
            Self::ApiToken {
                user,
                realm,
                token_id,
                ..
            } => write!(f, "Credentials::ApiToken({}@{}!{})", user, realm, token_id),
        }
    }
}

/// Observable authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// What the login endpoint hands back, before the client stamps validity.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketGrant {
    pub ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub username: String,
}

/// An issued authentication ticket with client-tracked validity.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub ticket: String,
    pub csrf_token: Option<String>,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Ticket {
    /// Expired when `expires_at <= now + skew`; the skew tolerance makes
    /// the client refresh slightly early rather than race the server.
    pub fn expired_by(&self, skew: chrono::Duration) -> bool {
        Utc::now() + skew >= self.expires_at
    }
}

// ─── Version ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub repoid: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// ─── Nodes ──────────────────────────────────────────────────────────────────

/// Summary entry from `GET /api2/json/nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub maxcpu: u32,
    #[serde(default)]
    pub maxmem: u64,
    #[serde(default)]
    pub mem: u64,
    #[serde(default)]
    pub ssl_fingerprint: String,
    #[serde(default)]
    pub uptime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub maxcpu: u32,
    #[serde(default)]
    pub mem: u64,
    #[serde(default)]
    pub maxmem: u64,
    #[serde(default)]
    pub uptime: u64,
    #[serde(default)]
    pub loadavg: Vec<serde_json::Value>,
    #[serde(default)]
    pub kversion: String,
    #[serde(default)]
    pub pveversion: String,
    pub rootfs: Option<FsUsage>,
    pub swap: Option<FsUsage>,
    #[serde(default)]
    pub idle: i64,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Filesystem/swap usage block inside a node status payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsUsage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub free: u64,
    #[serde(default)]
    pub avail: u64,
}

// ─── QEMU VMs ───────────────────────────────────────────────────────────────

/// Guest summary/status as returned by the `qemu` listing and
/// `status/current` endpoints. Proxmox omits most counters for stopped
/// guests, hence the blanket defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QemuVm {
    pub vmid: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub maxmem: u64,
    #[serde(default)]
    pub mem: u64,
    #[serde(default)]
    pub maxdisk: u64,
    #[serde(default)]
    pub disk: u64,
    #[serde(default)]
    pub diskread: u64,
    #[serde(default)]
    pub diskwrite: u64,
    #[serde(default)]
    pub netin: u64,
    #[serde(default)]
    pub netout: u64,
    #[serde(default)]
    pub uptime: u64,
    #[serde(default)]
    pub template: u8,
    #[serde(default)]
    pub qmpstatus: String,
    pub tags: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Body for `POST /api2/json/nodes/{node}/qemu`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmCreateRequest {
    pub vmid: u32,
    pub name: String,
    #[serde(default = "default_cores")]
    pub cores: u32,
    /// Memory in MiB.
    #[serde(default = "default_memory")]
    pub memory: u32,
    #[serde(default = "default_ostype")]
    pub ostype: String,
    #[serde(default = "default_scsi0")]
    pub scsi0: String,
    #[serde(default = "default_net0")]
    pub net0: String,
}

fn default_cores() -> u32 {
    1
}
fn default_memory() -> u32 {
    512
}
fn default_ostype() -> String {
    "l26".to_string()
}
fn default_scsi0() -> String {
    "local-lvm:32".to_string()
}
fn default_net0() -> String {
    "virtio,bridge=vmbr0".to_string()
}

/// Guest lifecycle actions mapped onto `status/{action}` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmAction {
    Start,
    Stop,
    Shutdown,
    Reset,
    Suspend,
    Resume,
}

impl VmAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Shutdown => "shutdown",
            Self::Reset => "reset",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
        }
    }
}

/// Snapshot entry for a guest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub snaptime: Option<i64>,
    pub parent: Option<String>,
    #[serde(default)]
    pub vmstate: u8,
}

// ─── LXC Containers ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LxcContainer {
    /// Container id. The LXC listing returns this as a string.
    #[serde(deserialize_with = "crate::types::de_vmid")]
    pub vmid: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub maxmem: u64,
    #[serde(default)]
    pub mem: u64,
    #[serde(default)]
    pub maxdisk: u64,
    #[serde(default)]
    pub disk: u64,
    #[serde(default)]
    pub uptime: u64,
    #[serde(default)]
    pub template: u8,
    pub tags: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Body for `POST /api2/json/nodes/{node}/lxc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LxcCreateRequest {
    pub vmid: u32,
    pub hostname: String,
    pub ostemplate: String,
    #[serde(default = "default_cores")]
    pub cores: u32,
    #[serde(default = "default_memory")]
    pub memory: u32,
    #[serde(default = "default_rootfs")]
    pub rootfs: String,
    #[serde(default = "default_lxc_net0")]
    pub net0: String,
}

fn default_rootfs() -> String {
    "local-lvm:8".to_string()
}
fn default_lxc_net0() -> String {
    "name=eth0,bridge=vmbr0,ip=dhcp".to_string()
}

// `vmid` arrives as a number for QEMU listings but as a string for LXC.
pub(crate) fn de_vmid<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

// ─── Storage ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    pub storage: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub shared: u8,
    #[serde(default)]
    pub active: u8,
    #[serde(default)]
    pub enabled: u8,
    #[serde(default)]
    pub avail: u64,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub total: u64,
}

/// Volume entry from a storage content listing (backups, ISOs, templates).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageContent {
    pub volid: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub ctime: i64,
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "de_opt_vmid")]
    pub vmid: Option<u32>,
}

fn de_opt_vmid<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Text(String),
        None,
    }
    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// Parameters for a vzdump backup job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRequest {
    pub vmid: u32,
    pub storage: String,
    #[serde(default = "default_backup_mode")]
    pub mode: String,
    #[serde(default = "default_backup_compress")]
    pub compress: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_backup_mode() -> String {
    "snapshot".to_string()
}
fn default_backup_compress() -> String {
    "zstd".to_string()
}

// ─── Tasks ──────────────────────────────────────────────────────────────────

/// Task status as returned by the node task endpoints. Long-running
/// operations (lifecycle, migrate, vzdump) answer with a UPID referencing
/// one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub upid: String,
    #[serde(default)]
    pub node: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub status: String,
    pub exitstatus: Option<String>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub starttime: i64,
    pub endtime: Option<i64>,
    #[serde(default)]
    pub pid: i64,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// ─── Cluster ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub nodeid: i64,
    pub ip: Option<String>,
    #[serde(default)]
    pub online: u8,
    #[serde(default)]
    pub local: u8,
    #[serde(default)]
    pub level: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Entry from `GET /api2/json/cluster/resources` — loosely typed because
/// the row shape varies with the resource kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResource {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub node: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// ─── Access / Users ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub userid: String,
    #[serde(default)]
    pub enable: u8,
    pub expire: Option<i64>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreateRequest {
    pub userid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(default = "default_enable")]
    pub enable: u8,
}

fn default_enable() -> u8 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_grant_decodes_csrf_rename() {
        let json = r#"{
            "ticket": "PVE:root@pam:68A1B2C3::abcdef",
            "CSRFPreventionToken": "68A1B2C3:xyz",
            "username": "root@pam"
        }"#;
        let grant: TicketGrant = serde_json::from_str(json).unwrap();
        assert!(grant.ticket.starts_with("PVE:"));
        assert_eq!(grant.csrf_token.as_deref(), Some("68A1B2C3:xyz"));
        assert_eq!(grant.username, "root@pam");
    }

    #[test]
    fn node_listing_tolerates_sparse_rows() {
        let json = r#"[
            {"node": "pve1", "status": "online", "cpu": 0.03, "maxcpu": 8,
             "mem": 4200000000, "maxmem": 16000000000, "uptime": 86400,
             "ssl_fingerprint": "AA:BB", "level": ""},
            {"node": "pve2", "status": "offline"}
        ]"#;
        let nodes: Vec<Node> = serde_json::from_str(json).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].node, "pve2");
        assert_eq!(nodes[1].uptime, 0);
    }

    #[test]
    fn stopped_vm_decodes_without_counters() {
        let json = r#"{"vmid": 100, "name": "web01", "status": "stopped", "unknown_field": 7}"#;
        let vm: QemuVm = serde_json::from_str(json).unwrap();
        assert_eq!(vm.vmid, 100);
        assert_eq!(vm.status, "stopped");
        assert_eq!(vm.mem, 0);
        assert!(vm.extra.contains_key("unknown_field"));
    }

    #[test]
    fn lxc_vmid_accepts_string_and_number() {
        let as_text: LxcContainer =
            serde_json::from_str(r#"{"vmid": "101", "status": "running"}"#).unwrap();
        let as_num: LxcContainer =
            serde_json::from_str(r#"{"vmid": 102, "status": "stopped"}"#).unwrap();
        assert_eq!(as_text.vmid, 101);
        assert_eq!(as_num.vmid, 102);
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let c = Credentials::password("root", "pam", "hunter2");
        let shown = format!("{:?}", c);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("root@pam"));

        let t = Credentials::api_token("automation", "pve", "ci", "s3cret-uuid");
        let shown = format!("{:?}", t);
        assert!(!shown.contains("s3cret-uuid"));
        assert!(shown.contains("automation@pve!ci"));
    }

    #[test]
    fn ticket_expiry_respects_skew() {
        let now = Utc::now();
        let t = Ticket {
            ticket: "PVE:x".into(),
            csrf_token: None,
            username: "root@pam".into(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(10),
        };
        assert!(!t.expired_by(chrono::Duration::seconds(0)));
        // 10 s of remaining validity is inside a 30 s skew window
        assert!(t.expired_by(chrono::Duration::seconds(30)));
    }
}
