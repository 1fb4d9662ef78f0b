//! Delivery error types for webhook notifications.

use thiserror::Error;

/// Errors raised while delivering a notification.
///
/// All variants are immediately fatal: there is no retry, and the caller
/// receives the vendor's status/message text verbatim.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The webhook endpoint answered with a non-2xx HTTP status.
    #[error("Lark API error: {status} {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The endpoint accepted the request but rejected the card
    /// (vendor JSON `code` was non-zero).
    #[error("Lark API error: {msg}")]
    Api { code: i64, msg: String },

    /// The request itself could not be performed.
    #[error("failed to deliver webhook request")]
    Transport(#[from] reqwest::Error),

    /// A 2xx response body was not the expected vendor JSON.
    #[error("failed to parse webhook response")]
    InvalidResponse(#[from] serde_json::Error),
}
