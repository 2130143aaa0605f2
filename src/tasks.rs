//! Node task log: every long-running write answers with a UPID that is
//! tracked here.

use crate::client::ProxmoxClient;
use crate::error::ProxmoxResult;
use crate::transport::{path_segment, ApiRequest};
use crate::types::TaskStatus;

/// Task operations backed by a borrowed [`ProxmoxClient`].
pub struct TasksApi<'a> {
    client: &'a ProxmoxClient,
}

impl<'a> TasksApi<'a> {
    pub(crate) fn new(client: &'a ProxmoxClient) -> Self {
        Self { client }
    }

    /// Recent tasks on a node, newest first.
    pub async fn list(&self, node: &str, limit: u32, start: u32) -> ProxmoxResult<Vec<TaskStatus>> {
        self.client
            .execute(
                ApiRequest::get(format!("/api2/json/nodes/{}/tasks", node))
                    .query("limit", limit.to_string())
                    .query("start", start.to_string()),
            )
            .await
    }

    /// Status of one task. UPIDs contain `:`, hence the encoding.
    pub async fn status(&self, node: &str, upid: &str) -> ProxmoxResult<TaskStatus> {
        self.client
            .execute(ApiRequest::get(format!(
                "/api2/json/nodes/{}/tasks/{}/status",
                node,
                path_segment(upid)
            )))
            .await
    }

    /// Abort a running task.
    pub async fn stop(&self, node: &str, upid: &str) -> ProxmoxResult<Option<String>> {
        self.client
            .execute(ApiRequest::delete(format!(
                "/api2/json/nodes/{}/tasks/{}",
                node,
                path_segment(upid)
            )))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_decodes_running_and_finished() {
        let running: TaskStatus = serde_json::from_str(
            r#"{"upid": "UPID:pve1:0001:qmstart:100:root@pam:", "type": "qmstart",
                "status": "running", "user": "root@pam", "starttime": 1722800000, "pid": 4321}"#,
        )
        .unwrap();
        assert_eq!(running.kind, "qmstart");
        assert!(running.exitstatus.is_none());

        let finished: TaskStatus = serde_json::from_str(
            r#"{"upid": "UPID:pve1:0001:qmstart:100:root@pam:", "status": "stopped",
                "exitstatus": "OK", "endtime": 1722800042}"#,
        )
        .unwrap();
        assert_eq!(finished.exitstatus.as_deref(), Some("OK"));
    }
}
