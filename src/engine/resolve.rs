//! Source repository resolution.
//!
//! Every candidate repository is asked for a branch named after the app id;
//! the one with the strictly newest commit wins. Candidate failures are
//! warnings, not fatal: a single healthy repository is enough.

use crate::github::GithubClient;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// A candidate repository whose branch matched the requested app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub repo: String,
    pub commit_date: DateTime<Utc>,
}

/// Pick the candidate with the strictly latest commit date.
///
/// Comparison is strict `>`: on equal dates the earlier-seen candidate is
/// kept, so the caller's priority order breaks ties.
pub fn select_latest(candidates: &[Candidate]) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;
    for candidate in candidates {
        match best {
            Some(b) if candidate.commit_date > b.commit_date => best = Some(candidate),
            None => best = Some(candidate),
            _ => {}
        }
    }
    best
}

/// Query every candidate repository for the app's branch and select the
/// freshest. `repos` is consulted in order (override first, then defaults).
pub async fn resolve_repository(
    github: &GithubClient,
    repos: &[String],
    app_id: &str,
) -> Option<String> {
    let mut candidates = Vec::new();
    for repo in repos {
        match github.branch_info(repo, app_id).await {
            Ok(Some(info)) => {
                candidates.push(Candidate {
                    repo: repo.clone(),
                    commit_date: info.commit_date,
                });
            }
            Ok(None) => {
                debug!("no matching branch in repository: {repo}");
            }
            Err(e) => {
                warn!("repository check failed for {repo}: {e}");
            }
        }
    }
    let selected = select_latest(&candidates)?;
    info!("using manifest repository: {}", selected.repo);
    Some(selected.repo.clone())
}
