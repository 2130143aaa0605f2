//! Cluster-wide status and resource listing.

use crate::client::ProxmoxClient;
use crate::error::ProxmoxResult;
use crate::transport::ApiRequest;
use crate::types::{ClusterNode, ClusterResource};

/// Cluster operations backed by a borrowed [`ProxmoxClient`].
pub struct ClusterApi<'a> {
    client: &'a ProxmoxClient,
}

impl<'a> ClusterApi<'a> {
    pub(crate) fn new(client: &'a ProxmoxClient) -> Self {
        Self { client }
    }

    /// Quorum membership view.
    pub async fn status(&self) -> ProxmoxResult<Vec<ClusterNode>> {
        self.client
            .execute(ApiRequest::get("/api2/json/cluster/status"))
            .await
    }

    /// Every resource (guests, storage, nodes) across the cluster.
    pub async fn resources(&self) -> ProxmoxResult<Vec<ClusterResource>> {
        self.client
            .execute(ApiRequest::get("/api2/json/cluster/resources"))
            .await
    }
}
