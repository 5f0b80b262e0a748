use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知已读状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationStatus {
    Unread,
    Read,
}

/// 收件箱通知条目（服务端持有的实体）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub status: NotificationStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }
}

/// 推送事件分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Success,
    Error,
    Warning,
    #[default]
    Info,
    Promo,
}

impl Classification {
    /// 线上协议中使用的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Success => "success",
            Classification::Error => "error",
            Classification::Warning => "warning",
            Classification::Info => "info",
            Classification::Promo => "promo",
        }
    }

    /// 弹窗图标（封闭匹配，不支持外部扩展）
    pub fn icon(&self) -> &'static str {
        match self {
            Classification::Success => "✅",
            Classification::Error => "❌",
            Classification::Warning => "⚠️",
            Classification::Info => "ℹ️",
            Classification::Promo => "🎁",
        }
    }

    /// 弹窗强调色（十六进制 RGB）
    pub fn accent(&self) -> &'static str {
        match self {
            Classification::Success => "#22c55e",
            Classification::Error => "#ef4444",
            Classification::Warning => "#f59e0b",
            Classification::Info => "#3b82f6",
            Classification::Promo => "#a855f7",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 推送事件，仅存活于当前弹窗生命周期内，不做持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub classification: Classification,
    pub title: String,
    pub message: String,
}

impl PushEvent {
    /// 去重键：分类 + 标题 + 正文的逐字拼接（精确匹配，无分隔符）
    pub fn dedupe_key(&self) -> String {
        format!("{}{}{}", self.classification.as_str(), self.title, self.message)
    }
}

/// 实时通道下行帧
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum LiveFrame {
    #[serde(rename = "receiveNotification")]
    ReceiveNotification(PushFrame),
}

/// `receiveNotification` 帧负载，`type` 缺省为 info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushFrame {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
}

impl From<PushFrame> for PushEvent {
    fn from(frame: PushFrame) -> Self {
        Self {
            classification: frame.classification.unwrap_or_default(),
            title: frame.title,
            message: frame.message,
        }
    }
}

/// 收件箱查询响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxResponse {
    pub data: Vec<Notification>,
}

/// 批量变更响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: i32,
}

impl MutationResponse {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server_url: String,
    pub timeout_seconds: u64,
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            timeout_seconds: 30,
            page_size: 3,
        }
    }
}

impl AppConfig {
    /// 从环境变量读取配置，缺失或非法时回落到默认值
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let server_url =
            std::env::var("SUBPULSE_SERVER").unwrap_or(defaults.server_url);
        let timeout_seconds = std::env::var("SUBPULSE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_seconds);
        let page_size = std::env::var("SUBPULSE_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.page_size);

        Self {
            server_url,
            timeout_seconds,
            page_size,
        }
    }
}
