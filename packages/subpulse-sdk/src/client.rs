use crate::error::*;
use crate::SdkResult;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use subpulse_core::{InboxResponse, MutationResponse, Notification};

/// 401 回调：共享传输层触发的登录跳转副作用
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

/// `ids` 参数按逗号逐字拼接，直接嵌入查询串（协议要求不做 URL 编码）
pub fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Clone)]
pub struct InboxClient {
    client: Client,
    pub base_url: String,
    pub timeout: Duration,
    pub token: Option<String>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl InboxClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            token: None,
            on_unauthorized: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 注册 401 回调（登录跳转），对所有请求生效
    pub fn on_unauthorized(mut self, hook: UnauthorizedHook) -> Self {
        self.on_unauthorized = Some(hook);
        self
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(self.timeout);
        if let Some(token) = &self.token {
            request.header("Authorization", format!("Bearer {}", token))
        } else {
            request
        }
    }

    /// 统一响应拦截：401 触发回调并短路，其余错误按状态码上抛
    fn intercept(&self, response: Response) -> SdkResult<Response> {
        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(hook) = &self.on_unauthorized {
                hook();
            }
            return Err(SdkError::Unauthorized);
        }
        Ok(response.error_for_status()?)
    }

    pub(crate) fn toggle_read_url(&self, ids: &[i64], all: bool) -> String {
        format!(
            "{}/notifications/toggle-read?ids={}&all={}",
            self.base_url,
            join_ids(ids),
            all
        )
    }

    pub(crate) fn delete_url(&self, ids: &[i64], all: bool) -> String {
        format!(
            "{}/notifications?ids={}&all={}",
            self.base_url,
            join_ids(ids),
            all
        )
    }

    /// 拉取指定用户的收件箱
    pub async fn fetch_inbox(&self, user_id: i64) -> SdkResult<Vec<Notification>> {
        let url = format!("{}/notifications/user/{}", self.base_url, user_id);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let response = self.intercept(response)?;
        let inbox: InboxResponse = response.json().await?;
        Ok(inbox.data)
    }

    /// 拉取全部通知（不区分用户的全局视图）
    pub async fn fetch_all(&self) -> SdkResult<Vec<Notification>> {
        let url = format!("{}/notifications", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let response = self.intercept(response)?;
        let inbox: InboxResponse = response.json().await?;
        Ok(inbox.data)
    }

    /// 批量标记已读；`all=true` 时服务端忽略 `ids`
    pub async fn toggle_read(&self, ids: &[i64], all: bool) -> SdkResult<MutationResponse> {
        let url = self.toggle_read_url(ids, all);
        let response = self.authorized(self.client.patch(&url)).send().await?;
        let response = self.intercept(response)?;
        let result: MutationResponse = response.json().await?;
        if !result.is_ok() {
            return Err(SdkError::ApiError {
                status_code: result.status_code,
                message: result.message,
            });
        }
        Ok(result)
    }

    /// 批量删除；`all=true` 时服务端忽略 `ids`
    pub async fn delete(&self, ids: &[i64], all: bool) -> SdkResult<MutationResponse> {
        let url = self.delete_url(ids, all);
        let response = self.authorized(self.client.delete(&url)).send().await?;
        let response = self.intercept(response)?;
        let result: MutationResponse = response.json().await?;
        if !result.is_ok() {
            return Err(SdkError::ApiError {
                status_code: result.status_code,
                message: result.message,
            });
        }
        Ok(result)
    }
}
