//! LXC container operations. Same shape as the QEMU surface, minus
//! snapshots with vmstate.

use crate::client::ProxmoxClient;
use crate::error::ProxmoxResult;
use crate::transport::ApiRequest;
use crate::types::{LxcContainer, LxcCreateRequest, VmAction};

fn ct_path(node: &str, vmid: u32, tail: &str) -> String {
    format!("/api2/json/nodes/{}/lxc/{}{}", node, vmid, tail)
}

/// Container operations backed by a borrowed [`ProxmoxClient`].
pub struct LxcApi<'a> {
    client: &'a ProxmoxClient,
}

impl<'a> LxcApi<'a> {
    pub(crate) fn new(client: &'a ProxmoxClient) -> Self {
        Self { client }
    }

    /// List containers on a node.
    pub async fn list(&self, node: &str) -> ProxmoxResult<Vec<LxcContainer>> {
        self.client
            .execute(ApiRequest::get(format!("/api2/json/nodes/{}/lxc", node)))
            .await
    }

    /// Current status of one container.
    pub async fn status(&self, node: &str, vmid: u32) -> ProxmoxResult<LxcContainer> {
        self.client
            .execute(ApiRequest::get(ct_path(node, vmid, "/status/current")))
            .await
    }

    /// Create a container; returns the creation task UPID.
    pub async fn create(
        &self,
        node: &str,
        request: &LxcCreateRequest,
    ) -> ProxmoxResult<Option<String>> {
        let body = serde_json::to_value(request)?;
        self.client
            .execute(ApiRequest::post(format!("/api2/json/nodes/{}/lxc", node)).json(body))
            .await
    }

    /// Destroy a container; returns the removal task UPID.
    pub async fn delete(&self, node: &str, vmid: u32) -> ProxmoxResult<Option<String>> {
        self.client
            .execute(ApiRequest::delete(ct_path(node, vmid, "")))
            .await
    }

    /// Perform a lifecycle action; returns the task UPID.
    pub async fn action(
        &self,
        node: &str,
        vmid: u32,
        action: VmAction,
    ) -> ProxmoxResult<Option<String>> {
        let tail = format!("/status/{}", action.as_str());
        self.client
            .execute(ApiRequest::post(ct_path(node, vmid, &tail)))
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

    /// Migrate a container to another node; returns the task UPID.
    pub async fn migrate(
        &self,
        node: &str,
        vmid: u32,
        target: &str,
        restart: bool,
    ) -> ProxmoxResult<Option<String>> {
        let body = serde_json::json!({
            "target": target,
            "restart": if restart { 1 } else { 0 },
        });
        self.client
            .execute(ApiRequest::post(ct_path(node, vmid, "/migrate")).json(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_paths_follow_the_api2_scheme() {
        assert_eq!(
            ct_path("pve2", 101, "/status/start"),
            "/api2/json/nodes/pve2/lxc/101/status/start"
        );
    }
}
