//! HTTP client for the GitHub GraphQL API
//!
//! Two queries live here: the viewer profile snapshot and the batched
//! commit-statistics lookup used by the enrichment pass. The batch query
//! aliases one `repository` block per repo and one `object` block per SHA,
//! so a whole enrichment cycle costs a single round-trip.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use crate::config::GithubConfig;
use crate::error::{Error, Result};
use crate::types::{CommitStat, RepoShaBatch, UserProfileStats};

use super::CommitStatsSource;

const VIEWER_QUERY: &str = r#"
query {
  viewer {
    id
    login
    company
    followers { totalCount }
    following { totalCount }
    starredRepositories { totalCount }
    repositories { totalCount }
    publicRepos: repositories(privacy: PUBLIC) { totalCount }
    publicGists: gists(privacy: PUBLIC) { totalCount }
  }
}
"#;

/// HTTP client for the GitHub GraphQL endpoint
pub struct GraphqlClient {
    http_client: Client,
    url: String,
}

impl GraphqlClient {
    /// Create a new client from configuration
    pub fn new(config: &GithubConfig, timeout_secs: u64) -> Result<Self> {
        config.validate()?;

        let token = config
            .resolved_token()
            .ok_or_else(|| Error::Config("github token is required".to_string()))?;

        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| Error::Config(format!("invalid token: {}", e)))?,
        );

        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .user_agent(concat!("ghsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: config.graphql_url.clone(),
        })
    }

    /// Fetch a point-in-time snapshot of the authenticated user's profile
    pub fn viewer_stats(&self) -> Result<UserProfileStats> {
        let data = self.execute(VIEWER_QUERY)?;
        let viewer = data
            .get("viewer")
            .filter(|v| v.is_object())
            .ok_or_else(|| Error::GraphQl("response missing viewer object".to_string()))?;

        Ok(UserProfileStats {
            user_id: string_field(viewer, "id")?,
            login: string_field(viewer, "login")?,
            company: viewer
                .get("company")
                .and_then(Value::as_str)
                .map(str::to_string),
            followers: total_count(viewer, "followers")?,
            following: total_count(viewer, "following")?,
            starred_repos: total_count(viewer, "starredRepositories")?,
            repos: total_count(viewer, "repositories")?,
            public_repos: total_count(viewer, "publicRepos")?,
            public_gists: total_count(viewer, "publicGists")?,
        })
    }

    /// Execute a query and return the `data` object.
    ///
    /// A non-200 status or a transport failure is a `GraphQl` error (the
    /// timeout case stays distinguishable). Partial `errors` alongside
    /// usable `data` are logged and tolerated: unresolvable commits are
    /// expected to come back as null objects with an error entry.
    fn execute(&self, query: &str) -> Result<Value> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&json!({ "query": query }))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(e.to_string())
                } else {
                    Error::GraphQl(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::GraphQl(format!(
                "non-success status ({}): {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .map_err(|e| Error::GraphQl(format!("failed to parse response: {}", e)))?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                tracing::warn!(count = errors.len(), "GraphQL response carried errors");
            }
        }

        body.get("data")
            .filter(|d| d.is_object())
            .cloned()
            .ok_or_else(|| Error::GraphQl("response missing data object".to_string()))
    }
}

impl CommitStatsSource for GraphqlClient {
    fn commit_stats(&self, batches: &[RepoShaBatch]) -> Result<Vec<CommitStat>> {
        if batches.is_empty() {
            return Ok(vec![]);
        }

        let query = build_commit_stats_query(batches);
        let data = self.execute(&query)?;
        Ok(parse_commit_stats(&data, batches))
    }
}

/// Build the aliased batch query: `r{i}` per repository, `c{j}` per SHA.
fn build_commit_stats_query(batches: &[RepoShaBatch]) -> String {
    let mut query = String::from("query {\n");
    for (ri, batch) in batches.iter().enumerate() {
        query.push_str(&format!(
            "  r{}: repository(owner: \"{}\", name: \"{}\") {{\n",
            ri,
            escape(&batch.owner),
            escape(&batch.name)
        ));
        for (ci, sha) in batch.shas.iter().enumerate() {
            query.push_str(&format!(
                "    c{}: object(oid: \"{}\") {{ ... on Commit {{ id additions deletions changedFilesIfAvailable }} }}\n",
                ci,
                escape(sha)
            ));
        }
        query.push_str("  }\n");
    }
    query.push('}');
    query
}

/// Walk the aliased response; null repositories or objects are unresolved
/// commits and are simply skipped.
fn parse_commit_stats(data: &Value, batches: &[RepoShaBatch]) -> Vec<CommitStat> {
    let mut stats = Vec::new();
    for (ri, batch) in batches.iter().enumerate() {
        let repo = match data.get(format!("r{}", ri)).filter(|v| v.is_object()) {
            Some(repo) => repo,
            None => {
                tracing::warn!(owner = %batch.owner, name = %batch.name, "Repository not resolvable");
                continue;
            }
        };
        for (ci, sha) in batch.shas.iter().enumerate() {
            let commit = match repo.get(format!("c{}", ci)).filter(|v| v.is_object()) {
                Some(commit) => commit,
                None => continue, // force-pushed away or otherwise gone
            };
            let (node_id, additions, deletions, changed_files) = match (
                commit.get("id").and_then(Value::as_str),
                commit.get("additions").and_then(Value::as_i64),
                commit.get("deletions").and_then(Value::as_i64),
                commit.get("changedFilesIfAvailable").and_then(Value::as_i64),
            ) {
                (Some(id), Some(a), Some(d), Some(c)) => (id.to_string(), a, d, c),
                _ => continue,
            };
            stats.push(CommitStat {
                repo_id: batch.repo_id,
                sha: sha.clone(),
                additions,
                deletions,
                changed_files,
                node_id,
            });
        }
    }
    stats
}

fn string_field(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::GraphQl(format!("response missing viewer.{}", key)))
}

fn total_count(value: &Value, key: &str) -> Result<i64> {
    value
        .get(key)
        .and_then(|v| v.get("totalCount"))
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::GraphQl(format!("response missing viewer.{}.totalCount", key)))
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
