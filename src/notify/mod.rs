//! Notification adapters for build events.
//!
//! A caller hands us a [`NotificationData`] (the event plus the URLs and
//! logs it already resolved); a [`Notifier`] turns that into a vendor
//! payload and delivers it. Lark is the only backend today.

pub mod config;
pub mod error;
pub mod lark;

pub use config::{LarkConfig, NotifierConfig};
pub use error::NotifyError;
pub use lark::{build_payload, LarkNotifier, LarkPayload};

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::events::BuildEvent;

/// Everything needed to build one notification.
///
/// The preview/live URLs and log lines are resolved upstream; this module
/// only formats and delivers.
#[derive(Debug, Clone)]
pub struct NotificationData {
    pub event: BuildEvent,
    pub preview_url: Option<String>,
    pub live_url: Option<String>,
    pub logs: Vec<String>,
}

/// Trait for notification backends.
///
/// Implementations build their vendor-specific payload and handle their
/// own delivery errors; one call, one notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Format and deliver a notification for the given data.
    async fn notify(&self, data: &NotificationData) -> Result<(), NotifyError>;

    /// Backend identifier for logging/debugging
    fn name(&self) -> &'static str;
}

impl std::fmt::Debug for dyn Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").field("name", &self.name()).finish()
    }
}

/// Construct a notifier from configuration.
///
/// Matches on the configured backend name; unknown names are a
/// construction error, not a delivery error.
pub fn from_config(config: NotifierConfig) -> Result<Box<dyn Notifier>> {
    match config.backend.as_str() {
        "lark" => {
            info!("Initializing Lark notifier backend");
            Ok(Box::new(LarkNotifier::new(config.lark)?))
        }
        other => Err(anyhow::anyhow!("Unknown notifier backend: {}", other)),
    }
}
