//! Herald - Lark/Feishu notifications for Cloudflare Workers build events
//!
//! Translates a structured build event into an interactive card and POSTs
//! it to a custom-bot webhook. Formatting is pure; delivery is one HTTP
//! call with two fatal checks (HTTP status, vendor response code).

pub mod events;
pub mod notify;

pub use events::{BuildEvent, BuildStatus};
pub use notify::{
    build_payload, from_config, LarkConfig, LarkNotifier, NotificationData, Notifier,
    NotifierConfig, NotifyError,
};
