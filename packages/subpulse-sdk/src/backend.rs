use crate::client::InboxClient;
use crate::SdkResult;
use async_trait::async_trait;
use subpulse_core::{MutationResponse, Notification};

/// 收件箱后端抽象，供上层控制器注入（测试时可替换为内存实现）
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    async fn fetch_inbox(&self, user_id: i64) -> SdkResult<Vec<Notification>>;

    /// `all=true` 优先于 `ids`（服务端忽略 `ids`）
    async fn toggle_read(&self, ids: &[i64], all: bool) -> SdkResult<MutationResponse>;

    async fn delete(&self, ids: &[i64], all: bool) -> SdkResult<MutationResponse>;
}

#[async_trait]
impl NotificationBackend for InboxClient {
    async fn fetch_inbox(&self, user_id: i64) -> SdkResult<Vec<Notification>> {
        InboxClient::fetch_inbox(self, user_id).await
    }

    async fn toggle_read(&self, ids: &[i64], all: bool) -> SdkResult<MutationResponse> {
        InboxClient::toggle_read(self, ids, all).await
    }

    async fn delete(&self, ids: &[i64], all: bool) -> SdkResult<MutationResponse> {
        InboxClient::delete(self, ids, all).await
    }
}
