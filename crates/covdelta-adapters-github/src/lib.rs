//! GitHub Actions context adapter for covdelta.
//!
//! Turns a workflow event payload plus the runner environment into the
//! [`DiffOptions`] shown in the report and the head SHA a check run should be
//! attached to. Reading the environment and the event file is left to the
//! caller, so everything here is pure.

use covdelta_types::DiffOptions;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while resolving the Actions context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The event payload was not valid JSON for the expected shape.
    #[error("Invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// A field required by the event type is absent.
    #[error("Event of type \"{event}\" is missing \"{field}\" field")]
    MissingField { event: String, field: &'static str },

    /// No head SHA could be determined.
    #[error("Unable to determine head SHA for event \"{0}\"")]
    MissingSha(String),
}

// ============================================================================
// Environment
// ============================================================================

/// The subset of the runner environment covdelta needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionsEnv {
    /// `GITHUB_EVENT_NAME`
    pub event_name: String,
    /// `GITHUB_SHA`
    pub sha: Option<String>,
    /// `GITHUB_REF`
    pub git_ref: Option<String>,
    /// `GITHUB_WORKSPACE`
    pub workspace: Option<String>,
}

impl ActionsEnv {
    /// Build from a variable lookup, such as `|k| std::env::var(k).ok()`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            event_name: non_empty("GITHUB_EVENT_NAME").unwrap_or_default(),
            sha: non_empty("GITHUB_SHA"),
            git_ref: non_empty("GITHUB_REF"),
            workspace: non_empty("GITHUB_WORKSPACE"),
        }
    }
}

// ============================================================================
// Event Payload
// ============================================================================

/// Fields of a workflow event payload that covdelta reads.
///
/// Unknown fields are ignored; every field is optional because which ones
/// are present depends on the event type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub pull_request: Option<PullRequest>,
    /// Commit SHA after a push.
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub workflow_run: Option<WorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub head: GitRef,
    pub base: GitRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub head_commit: HeadCommit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadCommit {
    pub id: String,
}

/// Parse a payload from the contents of `GITHUB_EVENT_PATH`.
pub fn parse_payload(json: &str) -> Result<EventPayload, ContextError> {
    Ok(serde_json::from_str(json)?)
}

// ============================================================================
// Context Resolution
// ============================================================================

/// Options and check-run SHA resolved from an Actions run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubContext {
    pub options: DiffOptions,
    pub head_sha: String,
}

/// Report identifiers for the event.
///
/// Pull requests report the PR head commit and both branch names; pushes
/// report the pushed commit and the ref. Other events only carry the
/// repository and the workspace prefix.
pub fn diff_options(env: &ActionsEnv, payload: &EventPayload) -> DiffOptions {
    let mut options = DiffOptions {
        repository: payload.repository.as_ref().map(|r| r.full_name.clone()),
        prefix: env.workspace.as_ref().map(|ws| workspace_prefix(ws)),
        ..Default::default()
    };

    match env.event_name.as_str() {
        "pull_request" => {
            if let Some(pr) = &payload.pull_request {
                options.commit = Some(pr.head.sha.clone());
                options.head = Some(pr.head.git_ref.clone());
                options.base = Some(pr.base.git_ref.clone());
            }
        }
        "push" => {
            options.commit = payload.after.clone();
            options.head = env.git_ref.clone();
        }
        _ => {}
    }

    options
}

/// The commit a check run should be attached to.
///
/// `workflow_run` events use the triggering workflow's head commit; any
/// event carrying a pull request uses the PR head; everything else uses
/// `GITHUB_SHA`.
pub fn head_sha(env: &ActionsEnv, payload: &EventPayload) -> Result<String, ContextError> {
    if env.event_name == "workflow_run" {
        let run = payload
            .workflow_run
            .as_ref()
            .ok_or_else(|| ContextError::MissingField {
                event: env.event_name.clone(),
                field: "workflow_run",
            })?;
        return Ok(run.head_commit.id.clone());
    }

    if let Some(pr) = &payload.pull_request {
        return Ok(pr.head.sha.clone());
    }

    env.sha
        .clone()
        .ok_or_else(|| ContextError::MissingSha(env.event_name.clone()))
}

/// Resolve options and head SHA from the environment and raw payload JSON.
pub fn resolve_context(env: &ActionsEnv, payload_json: &str) -> Result<GithubContext, ContextError> {
    let payload = parse_payload(payload_json)?;
    Ok(GithubContext {
        options: diff_options(env, &payload),
        head_sha: head_sha(env, &payload)?,
    })
}

fn workspace_prefix(workspace: &str) -> String {
    if workspace.ends_with('/') {
        workspace.to_string()
    } else {
        format!("{}/", workspace)
    }
}

// ============================================================================
// Tests
// ============================================================================
