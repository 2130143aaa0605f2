//! User management under `/api2/json/access`.

use crate::client::ProxmoxClient;
use crate::error::ProxmoxResult;
use crate::transport::{path_segment, ApiRequest};
use crate::types::{User, UserCreateRequest};

/// Access-control operations backed by a borrowed [`ProxmoxClient`].
pub struct AccessApi<'a> {
    client: &'a ProxmoxClient,
}

impl<'a> AccessApi<'a> {
    pub(crate) fn new(client: &'a ProxmoxClient) -> Self {
        Self { client }
    }

    /// List user accounts.
    pub async fn users(&self) -> ProxmoxResult<Vec<User>> {
        self.client
            .execute(ApiRequest::get("/api2/json/access/users"))
            .await
    }

    /// Create a user account.
    pub async fn create_user(&self, request: &UserCreateRequest) -> ProxmoxResult<Option<String>> {
        let body = serde_json::to_value(request)?;
        self.client
            .execute(ApiRequest::post("/api2/json/access/users").json(body))
            .await
    }

    /// Update a user account. User ids are `name@realm`, so the id is
    /// percent-encoded into the path.
    pub async fn update_user(
        &self,
        userid: &str,
        request: &UserCreateRequest,
    ) -> ProxmoxResult<Option<String>> {
        let body = serde_json::to_value(request)?;
        self.client
            .execute(
                ApiRequest::put(format!("/api2/json/access/users/{}", path_segment(userid)))
                    .json(body),
            )
            .await
    }

    /// Delete a user account.
    pub async fn delete_user(&self, userid: &str) -> ProxmoxResult<Option<String>> {
        self.client
            .execute(ApiRequest::delete(format!(
                "/api2/json/access/users/{}",
                path_segment(userid)
            )))
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::transport::path_segment;

    #[test]
    fn user_ids_are_path_safe() {
        assert_eq!(path_segment("monitor@pve"), "monitor%40pve");
    }
}
