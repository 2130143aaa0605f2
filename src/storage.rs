//! Storage pools, content listings and vzdump backups.

use crate::client::ProxmoxClient;
use crate::error::ProxmoxResult;
use crate::transport::{path_segment, ApiRequest};
use crate::types::{BackupRequest, Storage, StorageContent};

/// Storage operations backed by a borrowed [`ProxmoxClient`].
pub struct StorageApi<'a> {
    client: &'a ProxmoxClient,
}

impl<'a> StorageApi<'a> {
    pub(crate) fn new(client: &'a ProxmoxClient) -> Self {
        Self { client }
    }

    /// List storage pools visible on a node.
    pub async fn list(&self, node: &str) -> ProxmoxResult<Vec<Storage>> {
        self.client
            .execute(ApiRequest::get(format!("/api2/json/nodes/{}/storage", node)))
            .await
    }

    /// List volumes (backups, ISOs, templates) on one storage.
    pub async fn content(&self, node: &str, storage: &str) -> ProxmoxResult<Vec<StorageContent>> {
        self.client
            .execute(ApiRequest::get(format!(
                "/api2/json/nodes/{}/storage/{}/content",
                node, storage
            )))
            .await
    }

    /// Delete a volume. Volume ids carry `:` and `/`, so the id is
    /// percent-encoded into the path.
    pub async fn delete_volume(
        &self,
        node: &str,
        storage: &str,
        volid: &str,
    ) -> ProxmoxResult<Option<String>> {
        self.client
            .execute(ApiRequest::delete(format!(
                "/api2/json/nodes/{}/storage/{}/content/{}",
                node,
                storage,
                path_segment(volid)
            )))
            .await
    }

    /// Start a vzdump backup job for one guest; returns the task UPID.
    pub async fn backup(&self, node: &str, request: &BackupRequest) -> ProxmoxResult<Option<String>> {
        let body = serde_json::to_value(request)?;
        self.client
            .execute(ApiRequest::post(format!("/api2/json/nodes/{}/vzdump", node)).json(body))
            .await
    }
}
