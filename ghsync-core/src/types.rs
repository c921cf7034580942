//! Core domain types for ghsync
//!
//! These types represent the canonical data model that normalizes the
//! heterogeneous event records returned by the GitHub activity feed.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Partition** | One of the two independent event streams: events *created by* the user vs events *received by* the user |
//! | **Bootstrap** | First-ever sync of a partition; walks every historical page |
//! | **Incremental** | Steady-state sync; fetches only pages newer than the last stored event |
//! | **Enrichment** | Batched backfill of commit-derived fields omitted by the list-events API |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Event partitions
// ============================================

/// Which of the two independent activity streams an event came from.
///
/// Cursor state (oldest/latest stored timestamps) is tracked per partition
/// and never crosses into the other partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Events the user generated (`/users/{login}/events`)
    Created,
    /// Events delivered to the user (`/users/{login}/received_events`)
    Received,
}

impl EventSource {
    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Created => "created",
            EventSource::Received => "received",
        }
    }
}

impl std::str::FromStr for EventSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(EventSource::Created),
            "received" => Ok(EventSource::Received),
            _ => Err(format!("unknown event source: {}", s)),
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Event kinds
// ============================================

/// Closed tag for the event types that get special normalization.
///
/// The remote source can introduce new event types at any time, so the
/// storage boundary keeps the open string tag (`GithubEvent::event_type`);
/// this enum only classifies the types we derive extra fields for.
/// Everything else falls through to [`EventKind::Other`], which is not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Push,
    PullRequest,
    Issues,
    IssueComment,
    CommitComment,
    Other,
}

impl EventKind {
    /// Classify a raw `type` tag, case-insensitively.
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "pushevent" => EventKind::Push,
            "pullrequestevent" => EventKind::PullRequest,
            "issuesevent" => EventKind::Issues,
            "issuecommentevent" => EventKind::IssueComment,
            "commitcommentevent" => EventKind::CommitComment,
            _ => EventKind::Other,
        }
    }
}

// ============================================
// Raw wire records (serde deserialization)
// ============================================

/// One raw event record as returned by the list-events API.
///
/// Common fields are `Option` so that a missing field surfaces as a
/// `MalformedEvent` error during normalization instead of a serde failure
/// that would poison the whole page before we can name the offender.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawEvent {
    /// Externally-assigned id; arrives as a decimal string
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub actor: Option<RawIdentity>,
    pub repo: Option<RawIdentity>,
    pub org: Option<RawIdentity>,
    /// Opaque, origin-defined structured blob; retained verbatim
    pub payload: serde_json::Value,
    pub public: bool,
    pub created_at: Option<String>,
}

/// Denormalized id + display-name pair (actor, repo, org).
///
/// The repo block uses `name` for its full name and the actor/org blocks
/// use `login`; both are accepted here.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawIdentity {
    pub id: Option<i64>,
    pub login: Option<String>,
    pub name: Option<String>,
}

impl RawIdentity {
    /// Display name regardless of which key the API used.
    pub fn display_name(&self) -> Option<&str> {
        self.login.as_deref().or(self.name.as_deref())
    }
}

// ============================================
// Canonical event record
// ============================================

/// A normalized GitHub event, uniquely identified by (id, source).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubEvent {
    /// Externally-assigned 64-bit id
    pub id: i64,
    /// Partition this event was fetched from
    pub source: EventSource,
    /// Open string tag as delivered by the API (e.g. "PushEvent")
    pub event_type: String,
    pub actor_id: i64,
    pub actor_login: String,
    pub repo_id: i64,
    pub repo_name: String,
    pub org_id: Option<i64>,
    pub org_login: Option<String>,
    /// Origin-defined payload, retained verbatim
    pub payload: serde_json::Value,
    pub public: bool,
    /// Sub-type string from `payload.action`, when the event type carries one
    pub action: Option<String>,
    /// Origin-assigned timestamp, immutable once set
    pub created_at: DateTime<Utc>,

    // Type-specific derived fields; unset for most event types
    pub commit_sha: Option<String>,
    pub pr_number: Option<i64>,
    pub node_id: Option<String>,
    pub additions: Option<i64>,
    pub deletions: Option<i64>,
    pub changed_files: Option<i64>,
}

impl GithubEvent {
    /// Whether this row is a candidate for the commit enrichment pass.
    pub fn needs_enrichment(&self) -> bool {
        EventKind::from_type_name(&self.event_type) == EventKind::Push && self.node_id.is_none()
    }
}

// ============================================
// Enrichment types
// ============================================

/// SHAs to resolve for one repository, keyed by the stored repo id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoShaBatch {
    pub repo_id: i64,
    /// Repository owner (left of the `/` in the stored full name)
    pub owner: String,
    /// Repository name (right of the `/`)
    pub name: String,
    /// Distinct commit SHAs awaiting resolution
    pub shas: Vec<String>,
}

/// Commit statistics resolved by the batch query collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitStat {
    pub repo_id: i64,
    pub sha: String,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub node_id: String,
}

// ============================================
// Stats snapshots (append-only)
// ============================================

/// Point-in-time account metadata snapshot.
///
/// Append-only: every write creates a new row stamped at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfileStats {
    pub user_id: String,
    pub login: String,
    pub company: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub starred_repos: i64,
    pub repos: i64,
    pub public_repos: i64,
    pub public_gists: i64,
}

/// Point-in-time billing-minute counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingUsage {
    pub total_minutes_used: i64,
    pub total_paid_minutes_used: i64,
    /// Per-runner breakdown, retained verbatim
    pub minutes_used_breakdown: serde_json::Value,
}
