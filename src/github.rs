//! GitHub REST client for manifest repositories.
//!
//! Each app (or DLC) lives on a branch named after its numeric id. The
//! client exposes branch lookup, tree listing, raw-content download, and a
//! rate-limit probe. 404s surface as `None` so the engine can treat a
//! missing branch as "this repository does not carry that app".

use crate::config::Endpoints;
use crate::fetch::{FetchResult, Fetcher};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

/// Branch metadata the engine cares about: freshness and the file tree.
#[derive(Debug, Clone)]
pub struct BranchInfo {
    pub commit_date: DateTime<Utc>,
    pub tree_url: String,
}

/// One entry of a branch's file tree.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
}

/// Rate-limit probe result.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub remaining: u64,
    pub reset: i64,
}

#[derive(Clone)]
pub struct GithubClient {
    fetcher: Fetcher,
    endpoints: Endpoints,
}

impl GithubClient {
    pub fn new(fetcher: Fetcher, endpoints: Endpoints) -> Self {
        Self { fetcher, endpoints }
    }

    /// Look up a branch. `Ok(None)` when the repository has no branch with
    /// that name, or when the response does not carry commit data.
    pub async fn branch_info(&self, repo: &str, branch: &str) -> FetchResult<BranchInfo> {
        let url = self.endpoints.branch(repo, branch);
        let Some(body) = self.fetcher.get_json(&url).await? else {
            return Ok(None);
        };
        let commit = &body["commit"]["commit"];
        let date = commit["committer"]["date"]
            .as_str()
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());
        let tree_url = commit["tree"]["url"].as_str();
        Ok(match (date, tree_url) {
            (Some(commit_date), Some(tree_url)) => Some(BranchInfo {
                commit_date,
                tree_url: tree_url.to_string(),
            }),
            _ => None,
        })
    }

    /// List the file tree behind a branch's commit.
    pub async fn tree(&self, tree_url: &str) -> FetchResult<Vec<TreeEntry>> {
        let Some(body) = self.fetcher.get_json(tree_url).await? else {
            return Ok(None);
        };
        let Some(entries) = body.get("tree") else {
            return Ok(None);
        };
        let files: Vec<TreeEntry> =
            serde_json::from_value(entries.clone()).unwrap_or_default();
        Ok(Some(files))
    }

    /// Download one file of a branch via the raw-content CDN.
    pub async fn download_raw(&self, repo: &str, branch: &str, path: &str) -> FetchResult<Vec<u8>> {
        let url = self.endpoints.raw(repo, branch, path);
        self.fetcher.get_bytes(&url).await
    }

    /// Probe the API rate limit. Logs the remaining quota; the caller treats
    /// `remaining == 0` as fatal and surfaces the reset time.
    pub async fn check_rate_limit(&self) -> FetchResult<RateLimit> {
        let url = self.endpoints.rate_limit();
        let Some(body) = self.fetcher.get_json(&url).await? else {
            return Ok(None);
        };
        let rate = &body["rate"];
        let (Some(remaining), Some(reset)) = (rate["remaining"].as_u64(), rate["reset"].as_i64())
        else {
            return Ok(None);
        };
        info!("GitHub API requests remaining: {remaining}");
        Ok(Some(RateLimit { remaining, reset }))
    }
}
