pub mod backend;
pub mod client;
pub mod error;

pub use backend::NotificationBackend;
pub use client::InboxClient;
pub use error::{SdkError, SdkResult};
pub use subpulse_core::*;
