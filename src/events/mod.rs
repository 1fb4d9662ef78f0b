//! Build event model for Cloudflare Workers Builds webhooks.
//!
//! Events arrive as camelCase JSON with a type string, a payload carrying
//! the build status and trigger metadata, and a source descriptor naming
//! the worker that was built.

use serde::{Deserialize, Serialize};

/// A single build/deploy lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildEvent {
    /// Raw event type string (e.g. "workers.build.completed")
    #[serde(rename = "type", default)]
    pub event_type: String,

    #[serde(default)]
    pub payload: EventPayload,

    #[serde(default)]
    pub source: EventSource,
}

/// Event payload with status and trigger metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Raw build status as reported by the platform
    #[serde(default)]
    pub status: Option<String>,

    /// Build identifier, used to deep-link into the dashboard
    #[serde(default)]
    pub build_id: Option<String>,

    #[serde(default)]
    pub build_trigger_metadata: Option<TriggerMetadata>,
}

/// Metadata about the commit that triggered the build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerMetadata {
    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub commit_hash: Option<String>,

    #[serde(default)]
    pub author: Option<CommitAuthor>,

    /// Base URL of the source repository, when the platform resolved one
    #[serde(default)]
    pub repo_url: Option<String>,
}

/// Where the event came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(default)]
    pub worker_name: Option<String>,

    #[serde(default)]
    pub account_id: Option<String>,
}

/// Commit author, which the platform sends either as a bare string or as
/// an object with name/email/username fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommitAuthor {
    Name(String),
    Profile {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        username: Option<String>,
    },
}

impl CommitAuthor {
    /// Best human-readable name for the author, if any field carries one.
    pub fn display_name(&self) -> Option<&str> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.trim().is_empty())
        }

        match self {
            CommitAuthor::Name(name) if !name.trim().is_empty() => Some(name),
            CommitAuthor::Name(_) => None,
            CommitAuthor::Profile {
                name,
                email,
                username,
            } => non_empty(name).or(non_empty(username)).or(non_empty(email)),
        }
    }
}

/// Classified build status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Succeeded,
    Failed,
    Cancelled,
    Unknown,
}

impl BuildStatus {
    /// Map a raw platform status string to a classified status.
    ///
    /// Total over all inputs: anything not recognized is `Unknown`.
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "succeeded" | "success" => BuildStatus::Succeeded,
            "failed" | "failure" | "error" => BuildStatus::Failed,
            "cancelled" | "canceled" => BuildStatus::Cancelled,
            _ => BuildStatus::Unknown,
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Succeeded => write!(f, "succeeded"),
            BuildStatus::Failed => write!(f, "failed"),
            BuildStatus::Cancelled => write!(f, "cancelled"),
            BuildStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Whether a branch deploys to production rather than a preview.
pub fn is_production_branch(branch: Option<&str>) -> bool {
    matches!(branch, Some("main") | Some("master"))
}

impl BuildEvent {
    /// Classified status of this event.
    pub fn status(&self) -> BuildStatus {
        self.payload
            .status
            .as_deref()
            .map(BuildStatus::classify)
            .unwrap_or(BuildStatus::Unknown)
    }

    /// Worker name, when the source carries one.
    pub fn worker_name(&self) -> Option<&str> {
        self.source
            .worker_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn trigger_metadata(&self) -> Option<&TriggerMetadata> {
        self.payload.build_trigger_metadata.as_ref()
    }

    /// URL of the triggering commit, when both a repository URL and a
    /// commit hash are present.
    pub fn commit_url(&self) -> Option<String> {
        let meta = self.trigger_metadata()?;
        let repo = meta.repo_url.as_deref().filter(|s| !s.is_empty())?;
        let hash = meta.commit_hash.as_deref().filter(|s| !s.is_empty())?;
        Some(format!("{}/commit/{}", repo.trim_end_matches('/'), hash))
    }

    /// Dashboard URL for this build, when account and worker are known.
    ///
    /// Links to the build page when a build id is present, otherwise to
    /// the worker's service view.
    pub fn dashboard_url(&self) -> Option<String> {
        let account = self
            .source
            .account_id
            .as_deref()
            .filter(|s| !s.is_empty())?;
        let worker = self.worker_name()?;
        let mut url = format!(
            "https://dash.cloudflare.com/{account}/workers/services/view/{worker}"
        );
        if let Some(build_id) = self.payload.build_id.as_deref().filter(|s| !s.is_empty()) {
            url.push_str(&format!("/production/builds/{build_id}"));
        }
        Some(url)
    }
}
