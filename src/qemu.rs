//! QEMU virtual machine operations.
//!
//! Reads are idempotent; the lifecycle, migrate and snapshot writes are
//! not and are never retried by the client. Long-running writes answer
//! with a UPID that can be followed via [`crate::tasks::TasksApi`].

use crate::client::ProxmoxClient;
use crate::error::ProxmoxResult;
use crate::transport::{path_segment, ApiRequest};
use crate::types::{QemuVm, Snapshot, VmAction, VmCreateRequest};

fn vm_path(node: &str, vmid: u32, tail: &str) -> String {
    format!("/api2/json/nodes/{}/qemu/{}{}", node, vmid, tail)
}

/// VM operations backed by a borrowed [`ProxmoxClient`].
pub struct QemuApi<'a> {
    client: &'a ProxmoxClient,
}

impl<'a> QemuApi<'a> {
    pub(crate) fn new(client: &'a ProxmoxClient) -> Self {
        Self { client }
    }

    // ── Inventory ───────────────────────────────────────────────────

    /// List VMs on a node.
    pub async fn list(&self, node: &str) -> ProxmoxResult<Vec<QemuVm>> {
        self.client
            .execute(ApiRequest::get(format!("/api2/json/nodes/{}/qemu", node)))
            .await
    }

    /// Current status of one VM.
    pub async fn status(&self, node: &str, vmid: u32) -> ProxmoxResult<QemuVm> {
        self.client
            .execute(ApiRequest::get(vm_path(node, vmid, "/status/current")))
            .await
    }

    // ── Create / Delete ─────────────────────────────────────────────

    /// Create a VM; returns the creation task UPID.
    pub async fn create(
        &self,
        node: &str,
        request: &VmCreateRequest,
    ) -> ProxmoxResult<Option<String>> {
        let body = serde_json::to_value(request)?;
        self.client
            .execute(ApiRequest::post(format!("/api2/json/nodes/{}/qemu", node)).json(body))
            .await
    }

    /// Destroy a VM; returns the removal task UPID.
    pub async fn delete(&self, node: &str, vmid: u32) -> ProxmoxResult<Option<String>> {
        self.client
            .execute(ApiRequest::delete(vm_path(node, vmid, "")))
            .await
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Perform a lifecycle action; returns the task UPID.
    pub async fn action(
        &self,
        node: &str,
        vmid: u32,
        action: VmAction,
    ) -> ProxmoxResult<Option<String>> {
        let tail = format!("/status/{}", action.as_str());
        self.client
            .execute(ApiRequest::post(vm_path(node, vmid, &tail)))
            .await
    }

    pub async fn start(&self, node: &str, vmid: u32) -> ProxmoxResult<Option<String>> {
        self.action(node, vmid, VmAction::Start).await
    }

    pub async fn stop(&self, node: &str, vmid: u32) -> ProxmoxResult<Option<String>> {
        self.action(node, vmid, VmAction::Stop).await
    }

    pub async fn shutdown(&self, node: &str, vmid: u32) -> ProxmoxResult<Option<String>> {
        self.action(node, vmid, VmAction::Shutdown).await
    }

    pub async fn reset(&self, node: &str, vmid: u32) -> ProxmoxResult<Option<String>> {
        self.action(node, vmid, VmAction::Reset).await
    }

    pub async fn suspend(&self, node: &str, vmid: u32) -> ProxmoxResult<Option<String>> {
        self.action(node, vmid, VmAction::Suspend).await
    }

    pub async fn resume(&self, node: &str, vmid: u32) -> ProxmoxResult<Option<String>> {
        self.action(node, vmid, VmAction::Resume).await
    }

    /// Migrate a VM to another node; returns the migration task UPID.
    pub async fn migrate(
        &self,
        node: &str,
        vmid: u32,
        target: &str,
        online: bool,
    ) -> ProxmoxResult<Option<String>> {
        let body = serde_json::json!({
            "target": target,
            "online": if online { 1 } else { 0 },
        });
        self.client
            .execute(ApiRequest::post(vm_path(node, vmid, "/migrate")).json(body))
            .await
    }

    // ── Snapshots ───────────────────────────────────────────────────

    pub async fn snapshots(&self, node: &str, vmid: u32) -> ProxmoxResult<Vec<Snapshot>> {
        self.client
            .execute(ApiRequest::get(vm_path(node, vmid, "/snapshot")))
            .await
    }

    pub async fn create_snapshot(
        &self,
        node: &str,
        vmid: u32,
        snapname: &str,
    ) -> ProxmoxResult<Option<String>> {
        self.client
            .execute(
                ApiRequest::post(vm_path(node, vmid, "/snapshot")).query("snapname", snapname),
            )
            .await
    }

    pub async fn delete_snapshot(
        &self,
        node: &str,
        vmid: u32,
        snapname: &str,
    ) -> ProxmoxResult<Option<String>> {
        let tail = format!("/snapshot/{}", path_segment(snapname));
        self.client
            .execute(ApiRequest::delete(vm_path(node, vmid, &tail)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_paths_follow_the_api2_scheme() {
        assert_eq!(
            vm_path("pve1", 100, "/status/current"),
            "/api2/json/nodes/pve1/qemu/100/status/current"
        );
        assert_eq!(vm_path("pve1", 100, ""), "/api2/json/nodes/pve1/qemu/100");
    }

    #[test]
    fn actions_map_to_status_endpoints() {
        for (action, name) in [
            (VmAction::Start, "start"),
            (VmAction::Stop, "stop"),
            (VmAction::Shutdown, "shutdown"),
            (VmAction::Reset, "reset"),
            (VmAction::Suspend, "suspend"),
            (VmAction::Resume, "resume"),
        ] {
            assert_eq!(action.as_str(), name);
        }
    }
}
