//! Lark/Feishu notifier using interactive card messages.
//!
//! Builds one of four card shapes (success, failure, cancelled, fallback)
//! from a build event, then delivers it with a single HTTP POST to a
//! custom-bot webhook. See
//! <https://open.feishu.cn/document/client-docs/bot-v3/add-custom-bot>.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::LarkConfig;
use super::error::NotifyError;
use super::{NotificationData, Notifier};
use crate::events::{is_production_branch, BuildEvent, BuildStatus};

// ---------------------------------------------------------------------------
// Card model
// ---------------------------------------------------------------------------

/// Top-level Lark webhook payload.
#[derive(Debug, Clone, Serialize)]
pub struct LarkPayload {
    msg_type: &'static str,
    pub card: LarkCard,
}

impl LarkPayload {
    fn interactive(card: LarkCard) -> Self {
        Self {
            msg_type: "interactive",
            card,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LarkCard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<CardConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<CardHeader>,
    pub elements: Vec<CardElement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardConfig {
    pub wide_screen_mode: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardHeader {
    pub title: PlainText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<HeaderTemplate>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderTemplate {
    Green,
    Red,
    Yellow,
}

/// A `{"tag": "plain_text", "content": ...}` text object.
#[derive(Debug, Clone, Serialize)]
pub struct PlainText {
    tag: &'static str,
    pub content: String,
}

impl PlainText {
    fn new(content: impl Into<String>) -> Self {
        Self {
            tag: "plain_text",
            content: content.into(),
        }
    }
}

/// Card body elements, discriminated on the wire by their `tag` field.
///
/// Buttons are elements too; they only appear nested inside an action row.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum CardElement {
    Markdown {
        content: String,
    },
    Hr,
    Action {
        actions: Vec<CardElement>,
    },
    Button {
        text: PlainText,
        #[serde(rename = "type")]
        style: ButtonStyle,
        url: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    Default,
    Primary,
    Danger,
}

// ---------------------------------------------------------------------------
// Element builders
// ---------------------------------------------------------------------------

fn markdown(content: impl Into<String>) -> CardElement {
    CardElement::Markdown {
        content: content.into(),
    }
}

fn divider() -> CardElement {
    CardElement::Hr
}

fn action(buttons: Vec<CardElement>) -> CardElement {
    CardElement::Action { actions: buttons }
}

fn button(text: impl Into<String>, url: impl Into<String>, style: ButtonStyle) -> CardElement {
    CardElement::Button {
        text: PlainText::new(text),
        style,
        url: url.into(),
    }
}

fn header(title: impl Into<String>, template: HeaderTemplate) -> CardHeader {
    CardHeader {
        title: PlainText::new(title),
        template: Some(template),
    }
}

fn wide_card(header: CardHeader, elements: Vec<CardElement>) -> LarkCard {
    LarkCard {
        config: Some(CardConfig {
            wide_screen_mode: true,
        }),
        header: Some(header),
        elements,
    }
}

/// Branch, commit and author lines for the metadata block, or `None` when
/// the event carries none of them.
fn metadata_content(event: &BuildEvent) -> Option<String> {
    let meta = event.trigger_metadata()?;
    let mut parts = Vec::new();

    if let Some(branch) = meta.branch.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("**Branch:** `{branch}`"));
    }

    if let Some(hash) = meta.commit_hash.as_deref().filter(|s| !s.is_empty()) {
        let short: String = hash.chars().take(7).collect();
        match event.commit_url() {
            Some(url) => parts.push(format!("**Commit:** [{short}]({url})")),
            None => parts.push(format!("**Commit:** `{short}`")),
        }
    }

    if let Some(author) = meta.author.as_ref().and_then(|a| a.display_name()) {
        parts.push(format!("**Author:** {author}"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Error line shown in failure cards: the first log line mentioning an
/// error, else the last non-empty line, else a placeholder.
fn extract_build_error(logs: &[String]) -> String {
    if let Some(line) = logs
        .iter()
        .find(|l| l.to_ascii_lowercase().contains("error"))
    {
        return line.trim().to_string();
    }
    logs.iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| "Build failed with no logs available".to_string())
}

fn worker_title(event: &BuildEvent) -> CardElement {
    markdown(format!("**{}**", event.worker_name().unwrap_or("Worker")))
}

// ---------------------------------------------------------------------------
// Message builders
// ---------------------------------------------------------------------------

fn success_message(
    event: &BuildEvent,
    is_production: bool,
    preview_url: Option<&str>,
    live_url: Option<&str>,
) -> LarkPayload {
    let dash_url = event.dashboard_url();

    let title = if is_production {
        "Production Deploy"
    } else {
        "Preview Deploy"
    };
    let button_text = if is_production {
        if live_url.is_some() {
            "View Worker"
        } else {
            "View Build"
        }
    } else if preview_url.is_some() {
        "View Preview"
    } else {
        "View Build"
    };
    let button_url = if is_production {
        live_url.map(str::to_string).or(dash_url)
    } else {
        preview_url.map(str::to_string).or(dash_url)
    };

    let mut elements = vec![worker_title(event)];

    if let Some(content) = metadata_content(event) {
        elements.push(divider());
        elements.push(markdown(content));
    }

    if let Some(url) = button_url {
        elements.push(divider());
        elements.push(action(vec![button(button_text, url, ButtonStyle::Primary)]));
    }

    LarkPayload::interactive(wide_card(
        header(format!("✅ {title}"), HeaderTemplate::Green),
        elements,
    ))
}

fn failure_message(event: &BuildEvent, logs: &[String]) -> LarkPayload {
    let dash_url = event.dashboard_url();
    let error = extract_build_error(logs);

    let mut elements = vec![worker_title(event)];

    if let Some(content) = metadata_content(event) {
        elements.push(divider());
        elements.push(markdown(content));
    }

    elements.push(divider());
    elements.push(markdown(format!("```\n{error}\n```")));

    if let Some(url) = dash_url {
        elements.push(divider());
        elements.push(action(vec![button("View Logs", url, ButtonStyle::Danger)]));
    }

    LarkPayload::interactive(wide_card(
        header("❌ Build Failed", HeaderTemplate::Red),
        elements,
    ))
}

fn cancelled_message(event: &BuildEvent) -> LarkPayload {
    let dash_url = event.dashboard_url();

    let mut elements = vec![worker_title(event)];

    if let Some(content) = metadata_content(event) {
        elements.push(divider());
        elements.push(markdown(content));
    }

    if let Some(url) = dash_url {
        elements.push(divider());
        elements.push(action(vec![button("View Build", url, ButtonStyle::Default)]));
    }

    LarkPayload::interactive(wide_card(
        header("⚠️ Build Cancelled", HeaderTemplate::Yellow),
        elements,
    ))
}

fn fallback_message(event: &BuildEvent) -> LarkPayload {
    let event_type = if event.event_type.is_empty() {
        "Unknown event"
    } else {
        &event.event_type
    };
    LarkPayload::interactive(LarkCard {
        config: None,
        header: None,
        elements: vec![markdown(format!("📢 {event_type}"))],
    })
}

/// Build the card payload for a notification.
///
/// Selects exactly one of the four message shapes from the classified
/// status; any unrecognized status gets the fallback card.
pub fn build_payload(data: &NotificationData) -> LarkPayload {
    let event = &data.event;
    let branch = event
        .trigger_metadata()
        .and_then(|m| m.branch.as_deref());
    let is_production = is_production_branch(branch);

    match event.status() {
        BuildStatus::Succeeded => success_message(
            event,
            is_production,
            data.preview_url.as_deref(),
            data.live_url.as_deref(),
        ),
        BuildStatus::Failed => failure_message(event, &data.logs),
        BuildStatus::Cancelled => cancelled_message(event),
        BuildStatus::Unknown => fallback_message(event),
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Response body of the custom-bot webhook; `code` 0 means accepted.
#[derive(Debug, Deserialize)]
struct LarkResponse {
    code: i64,
    msg: Option<String>,
}

/// Decide whether a webhook response is a success.
///
/// Pure over (status, body text) so the two fatal checks from the webhook
/// contract are testable without a network.
fn check_response(status: reqwest::StatusCode, body: &str) -> Result<(), NotifyError> {
    if !status.is_success() {
        warn!("Lark API error: {} - {}", status, body);
        return Err(NotifyError::Http {
            status,
            body: body.to_string(),
        });
    }

    let response: LarkResponse = serde_json::from_str(body)?;
    if response.code != 0 {
        let msg = response.msg.unwrap_or_else(|| "Unknown error".to_string());
        warn!("Lark webhook rejected card: code={} msg={}", response.code, msg);
        return Err(NotifyError::Api {
            code: response.code,
            msg,
        });
    }

    Ok(())
}

/// Lark webhook notifier.
pub struct LarkNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl LarkNotifier {
    /// Create a notifier from configuration.
    ///
    /// Resolves the webhook URL (config value or env var) and builds the
    /// HTTP client with the configured timeout.
    pub fn new(config: LarkConfig) -> Result<Self> {
        let webhook_url = config.resolve_webhook_url()?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.effective_timeout_seconds(),
            ))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            webhook_url,
        })
    }

    /// POST a card payload to the webhook. One shot, no retry.
    pub async fn send(&self, payload: &LarkPayload) -> Result<(), NotifyError> {
        debug!("Posting Lark card to webhook");

        let response = self
            .client
            .post(&self.webhook_url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        check_response(status, &body)
    }
}

#[async_trait]
impl Notifier for LarkNotifier {
    async fn notify(&self, data: &NotificationData) -> Result<(), NotifyError> {
        debug!(
            "Building Lark card for {} event (status: {})",
            data.event.event_type,
            data.event.status()
        );
        let payload = build_payload(data);
        self.send(&payload).await
    }

    fn name(&self) -> &'static str {
        "lark"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BuildEvent;
    use pretty_assertions::assert_eq;

    fn succeeded_event() -> BuildEvent {
        serde_json::from_value(serde_json::json!({
            "type": "workers.build.completed",
            "payload": {
                "status": "succeeded",
                "buildId": "b-1",
                "buildTriggerMetadata": {
                    "branch": "main",
                    "commitHash": "0123456789abcdef",
                    "author": "Ada",
                    "repoUrl": "https://github.com/acme/site"
                }
            },
            "source": { "workerName": "site", "accountId": "acct1" }
        }))
        .unwrap()
    }

    fn data(event: BuildEvent) -> NotificationData {
        NotificationData {
            event,
            preview_url: None,
            live_url: None,
            logs: vec![],
        }
    }

    fn card_json(payload: &LarkPayload) -> serde_json::Value {
        serde_json::to_value(payload).unwrap()
    }

    fn buttons_of(card: &serde_json::Value) -> Vec<serde_json::Value> {
        card["card"]["elements"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|e| e["tag"] == "action")
            .flat_map(|e| e["actions"].as_array().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_success_with_live_url_targets_live_url() {
        let mut d = data(succeeded_event());
        d.live_url = Some("https://site.example.com".to_string());
        let json = card_json(&build_payload(&d));

        assert_eq!(json["msg_type"], "interactive");
        assert_eq!(json["card"]["header"]["title"]["content"], "✅ Production Deploy");
        assert_eq!(json["card"]["header"]["template"], "green");

        let buttons = buttons_of(&json);
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0]["text"]["content"], "View Worker");
        assert_eq!(buttons[0]["url"], "https://site.example.com");
        assert_eq!(buttons[0]["type"], "primary");
    }

    #[test]
    fn test_success_preview_branch_targets_preview_url() {
        let mut event = succeeded_event();
        event
            .payload
            .build_trigger_metadata
            .as_mut()
            .unwrap()
            .branch = Some("feature/login".to_string());
        let mut d = data(event);
        d.preview_url = Some("https://preview.site.example.com".to_string());
        let json = card_json(&build_payload(&d));

        assert_eq!(json["card"]["header"]["title"]["content"], "✅ Preview Deploy");
        let buttons = buttons_of(&json);
        assert_eq!(buttons[0]["text"]["content"], "View Preview");
        assert_eq!(buttons[0]["url"], "https://preview.site.example.com");
    }

    #[test]
    fn test_success_without_urls_falls_back_to_dashboard() {
        let json = card_json(&build_payload(&data(succeeded_event())));
        let buttons = buttons_of(&json);
        assert_eq!(buttons[0]["text"]["content"], "View Build");
        assert_eq!(
            buttons[0]["url"],
            "https://dash.cloudflare.com/acct1/workers/services/view/site/production/builds/b-1"
        );
    }

    #[test]
    fn test_success_without_any_url_omits_button() {
        let event: BuildEvent = serde_json::from_value(serde_json::json!({
            "type": "workers.build.completed",
            "payload": { "status": "succeeded" }
        }))
        .unwrap();
        let json = card_json(&build_payload(&data(event)));
        assert!(buttons_of(&json).is_empty());
    }

    #[test]
    fn test_failure_always_embeds_fenced_error_block() {
        let mut event = succeeded_event();
        event.payload.status = Some("failed".to_string());
        let mut d = data(event);
        d.logs = vec![
            "Installing dependencies".to_string(),
            "error: cannot find module 'left-pad'".to_string(),
            "Build step exited with code 1".to_string(),
        ];
        let json = card_json(&build_payload(&d));

        assert_eq!(json["card"]["header"]["title"]["content"], "❌ Build Failed");
        assert_eq!(json["card"]["header"]["template"], "red");

        let fenced: Vec<_> = json["card"]["elements"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|e| {
                e["tag"] == "markdown"
                    && e["content"].as_str().is_some_and(|c| c.starts_with("```"))
            })
            .collect();
        assert_eq!(fenced.len(), 1);
        assert_eq!(
            fenced[0]["content"],
            "```\nerror: cannot find module 'left-pad'\n```"
        );

        let buttons = buttons_of(&json);
        assert_eq!(buttons[0]["text"]["content"], "View Logs");
        assert_eq!(buttons[0]["type"], "danger");
    }

    #[test]
    fn test_failure_with_empty_logs_still_fenced() {
        let mut event = succeeded_event();
        event.payload.status = Some("failed".to_string());
        let json = card_json(&build_payload(&data(event)));
        let content = json["card"]["elements"]
            .as_array()
            .unwrap()
            .iter()
            .find_map(|e| e["content"].as_str().filter(|c| c.starts_with("```")))
            .unwrap();
        assert!(content.contains("Build failed with no logs available"));
    }

    #[test]
    fn test_cancelled_card_shape() {
        let mut event = succeeded_event();
        event.payload.status = Some("cancelled".to_string());
        let json = card_json(&build_payload(&data(event)));

        assert_eq!(json["card"]["header"]["title"]["content"], "⚠️ Build Cancelled");
        assert_eq!(json["card"]["header"]["template"], "yellow");
        let buttons = buttons_of(&json);
        assert_eq!(buttons[0]["text"]["content"], "View Build");
        assert_eq!(buttons[0]["type"], "default");
    }

    #[test]
    fn test_unknown_status_gets_fallback_with_single_markdown_element() {
        let event: BuildEvent = serde_json::from_value(serde_json::json!({
            "type": "workers.build.started",
            "payload": { "status": "queued" }
        }))
        .unwrap();
        let json = card_json(&build_payload(&data(event)));

        let elements = json["card"]["elements"].as_array().unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0]["tag"], "markdown");
        assert_eq!(elements[0]["content"], "📢 workers.build.started");
        assert!(json["card"].get("header").is_none());
    }

    #[test]
    fn test_commit_hash_truncated_and_linked() {
        let json = card_json(&build_payload(&data(succeeded_event())));
        let metadata = json["card"]["elements"][2]["content"].as_str().unwrap();
        assert!(metadata.contains("**Branch:** `main`"));
        assert!(metadata.contains(
            "[0123456](https://github.com/acme/site/commit/0123456789abcdef)"
        ));
        assert!(metadata.contains("**Author:** Ada"));
    }

    #[test]
    fn test_commit_without_repo_url_renders_inline_code() {
        let mut event = succeeded_event();
        event
            .payload
            .build_trigger_metadata
            .as_mut()
            .unwrap()
            .repo_url = None;
        let json = card_json(&build_payload(&data(event)));
        let metadata = json["card"]["elements"][2]["content"].as_str().unwrap();
        assert!(metadata.contains("**Commit:** `0123456`"));
    }

    #[test]
    fn test_worker_name_falls_back_to_generic_title() {
        let event: BuildEvent = serde_json::from_value(serde_json::json!({
            "type": "workers.build.completed",
            "payload": { "status": "succeeded" }
        }))
        .unwrap();
        let json = card_json(&build_payload(&data(event)));
        assert_eq!(json["card"]["elements"][0]["content"], "**Worker**");
    }

    #[test]
    fn test_extract_build_error_prefers_error_lines() {
        let logs = vec![
            "step 1 ok".to_string(),
            "ERROR: build exploded".to_string(),
            "done".to_string(),
        ];
        assert_eq!(extract_build_error(&logs), "ERROR: build exploded");
    }

    #[test]
    fn test_extract_build_error_falls_back_to_last_line() {
        let logs = vec!["compiling".to_string(), "exit status 1".to_string(), "  ".to_string()];
        assert_eq!(extract_build_error(&logs), "exit status 1");
        assert_eq!(
            extract_build_error(&[]),
            "Build failed with no logs available"
        );
    }

    #[test]
    fn test_check_response_non_2xx_carries_status_and_body() {
        let err =
            check_response(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_check_response_vendor_rejection_carries_message() {
        let err = check_response(
            reqwest::StatusCode::OK,
            r#"{"code": 19001, "msg": "invalid receive_id"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid receive_id"));

        let err = check_response(reqwest::StatusCode::OK, r#"{"code": 1}"#).unwrap_err();
        assert!(err.to_string().contains("Unknown error"));
    }

    #[test]
    fn test_check_response_accepts_code_zero() {
        assert!(check_response(
            reqwest::StatusCode::OK,
            r#"{"code": 0, "msg": "success"}"#
        )
        .is_ok());
    }

    #[test]
    fn test_check_response_rejects_unparseable_body() {
        let err = check_response(reqwest::StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, NotifyError::InvalidResponse(_)));
    }

    #[test]
    fn test_divider_and_button_wire_tags() {
        let json = serde_json::to_value(divider()).unwrap();
        assert_eq!(json, serde_json::json!({ "tag": "hr" }));

        let json =
            serde_json::to_value(button("Open", "https://example.com", ButtonStyle::Primary))
                .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tag": "button",
                "text": { "tag": "plain_text", "content": "Open" },
                "type": "primary",
                "url": "https://example.com"
            })
        );
    }
}
