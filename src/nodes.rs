//! Cluster node inventory and status.

use crate::client::ProxmoxClient;
use crate::error::ProxmoxResult;
use crate::transport::ApiRequest;
use crate::types::{Node, NodeStatus};

/// Node operations backed by a borrowed [`ProxmoxClient`].
pub struct NodesApi<'a> {
    client: &'a ProxmoxClient,
}

impl<'a> NodesApi<'a> {
    pub(crate) fn new(client: &'a ProxmoxClient) -> Self {
        Self { client }
    }

    /// List all nodes known to the endpoint.
    pub async fn list(&self) -> ProxmoxResult<Vec<Node>> {
        self.client.execute(ApiRequest::get("/api2/json/nodes")).await
    }

    /// Detailed status for a single node.
    pub async fn status(&self, node: &str) -> ProxmoxResult<NodeStatus> {
        self.client
            .execute(ApiRequest::get(format!("/api2/json/nodes/{}/status", node)))
            .await
    }
}
