pub mod inbox;
pub mod live;
pub mod toast;

pub use inbox::{InboxController, InboxMode, StatusFilter};
pub use live::{ConnectionState, LiveChannelManager, LiveConnection, LiveConnector, WsConnector};
pub use toast::{DedupTable, DismissReason, Surface, ToastAction, ToastStack, ToastUpdate};

use subpulse_core::Notification;

/// 格式化收件箱条目显示
pub fn format_notification(item: &Notification) -> String {
    let marker = if item.is_unread() { "●" } else { "○" };
    format!(
        "{} {} - {}\nReceived: {}",
        marker,
        item.title,
        item.message,
        item.created_at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// 格式化弹窗显示（含折叠计数徽标）
pub fn format_surface(surface: &Surface) -> String {
    if surface.count > 1 {
        format!(
            "{} {} - {} (x{})",
            surface.classification.icon(),
            surface.title,
            surface.message,
            surface.count
        )
    } else {
        format!(
            "{} {} - {}",
            surface.classification.icon(),
            surface.title,
            surface.message
        )
    }
}
