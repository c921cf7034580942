//! Event normalization
//!
//! Converts one raw event record (heterogeneous nested mapping) into a flat
//! [`GithubEvent`], dispatching on [`EventKind`] for the per-type extension
//! step that derives fields the list-events API scatters across payloads.
//!
//! # Error Handling
//!
//! - **Missing common fields** (id, type, actor, repo, created_at): returns
//!   [`Error::MalformedEvent`]. The caller decides whether to skip the event
//!   or abort the page; the sync driver aborts the page so a partially
//!   normalized batch is never persisted.
//! - **Unrecognized event types**: pass through with only common fields
//!   populated. Not an error; the feed grows new types at any time.
//! - **Payload access**: explicit accessors with required/optional semantics
//!   per field, instead of ad hoc existence checks.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{EventKind, EventSource, GithubEvent, RawEvent};

/// Timestamp format used by the activity feed (e.g. `2024-03-01T12:30:00Z`).
const GITHUB_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Normalize one raw event from the given partition into a flat record.
pub fn normalize(raw: &RawEvent, source: EventSource) -> Result<GithubEvent> {
    let id_str = raw
        .id
        .as_deref()
        .ok_or_else(|| malformed("<unknown>", "missing id"))?;
    let id: i64 = id_str
        .parse()
        .map_err(|_| malformed(id_str, "id is not a 64-bit integer"))?;

    let event_type = raw
        .event_type
        .clone()
        .ok_or_else(|| malformed(id_str, "missing type"))?;

    let actor = raw
        .actor
        .as_ref()
        .ok_or_else(|| malformed(id_str, "missing actor block"))?;
    let actor_id = actor
        .id
        .ok_or_else(|| malformed(id_str, "missing actor.id"))?;
    let actor_login = actor
        .display_name()
        .ok_or_else(|| malformed(id_str, "missing actor.login"))?
        .to_string();

    let repo = raw
        .repo
        .as_ref()
        .ok_or_else(|| malformed(id_str, "missing repo block"))?;
    let repo_id = repo.id.ok_or_else(|| malformed(id_str, "missing repo.id"))?;
    let repo_name = repo
        .display_name()
        .ok_or_else(|| malformed(id_str, "missing repo.name"))?
        .to_string();

    let created_at = parse_github_time(
        raw.created_at
            .as_deref()
            .ok_or_else(|| malformed(id_str, "missing created_at"))?,
    )
    .ok_or_else(|| malformed(id_str, "unparsable created_at"))?;

    // Org block is optional, but when present both halves come along
    let (org_id, org_login) = match &raw.org {
        Some(org) => (org.id, org.display_name().map(str::to_string)),
        None => (None, None),
    };

    let action = raw
        .payload
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut event = GithubEvent {
        id,
        source,
        event_type,
        actor_id,
        actor_login,
        repo_id,
        repo_name,
        org_id,
        org_login,
        payload: raw.payload.clone(),
        public: raw.public,
        action,
        created_at,
        commit_sha: None,
        pr_number: None,
        node_id: None,
        additions: None,
        deletions: None,
        changed_files: None,
    };

    match EventKind::from_type_name(&event.event_type) {
        EventKind::Push => extend_push(&mut event, id_str)?,
        EventKind::PullRequest => extend_pull_request(&mut event, id_str)?,
        EventKind::Issues => {
            event.node_id = required_str(&event.payload, &["issue", "node_id"], id_str)?;
        }
        EventKind::IssueComment | EventKind::CommitComment => {
            event.node_id = required_str(&event.payload, &["comment", "node_id"], id_str)?;
        }
        EventKind::Other => {}
    }

    Ok(event)
}

/// Push extension: the head commit identifier of the push.
fn extend_push(event: &mut GithubEvent, id: &str) -> Result<()> {
    event.commit_sha = required_str(&event.payload, &["head"], id)?;
    Ok(())
}

/// Pull-request extension.
///
/// Always derives the PR number and the size counters from the nested
/// pull-request object. When the action is `closed` the merge commit sha is
/// copied too; the feed supplies one even for closed-without-merge PRs, a
/// known source ambiguity we deliberately do not correct.
fn extend_pull_request(event: &mut GithubEvent, id: &str) -> Result<()> {
    let number = event
        .payload
        .get("number")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed(id, "missing payload.number"))?;
    event.pr_number = Some(number);

    let pr = event
        .payload
        .get("pull_request")
        .filter(|v| v.is_object())
        .ok_or_else(|| malformed(id, "missing payload.pull_request"))?;

    event.node_id = pr.get("node_id").and_then(Value::as_str).map(str::to_string);
    event.additions = pr.get("additions").and_then(Value::as_i64);
    event.deletions = pr.get("deletions").and_then(Value::as_i64);
    event.changed_files = pr.get("changed_files").and_then(Value::as_i64);

    if event.action.as_deref() == Some("closed") {
        event.commit_sha = pr
            .get("merge_commit_sha")
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    Ok(())
}

/// Parse a feed timestamp; returns `None` on format mismatch.
pub fn parse_github_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, GITHUB_TIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Walk `path` into the payload and require a string leaf.
fn required_str(payload: &Value, path: &[&str], id: &str) -> Result<Option<String>> {
    let mut cursor = payload;
    for key in path {
        cursor = cursor
            .get(key)
            .ok_or_else(|| malformed(id, &format!("missing payload.{}", path.join("."))))?;
    }
    cursor
        .as_str()
        .map(|s| Some(s.to_string()))
        .ok_or_else(|| malformed(id, &format!("payload.{} is not a string", path.join("."))))
}

fn malformed(id: &str, message: &str) -> Error {
    Error::MalformedEvent {
        id: id.to_string(),
        message: message.to_string(),
    }
}
