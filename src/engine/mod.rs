//! Acquisition engine: resolves an app to its freshest manifest branch,
//! fans file processing out over a bounded worker pool, recursively expands
//! DLC branches, and persists the aggregate as a Lua script.
//!
//! One engine instance drives one top-level run. All mutable state lives in
//! an engine-owned [`GatherState`] behind a mutex; file tasks and DLC
//! recursion append into it and only Finalize reads it back.

pub mod resolve;
pub mod state;

use crate::config::{
    self, Endpoints, APPINFO_VDF, CONFIG_JSON, DLC_FETCH_DELAY, KEY_VDF, MANIFEST_SUFFIX,
    MAX_WORKERS, REQUEST_TIMEOUT,
};
use crate::fetch::Fetcher;
use crate::github::GithubClient;
use crate::steam_path;
use crate::steam_store::{SearchHit, SteamStoreClient};
use crate::vdf;
use crate::writer::{self, store_lua};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, TimeZone};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use state::{GatherState, ManifestRef};

/// Picks one search hit when a name search returns several. The CLI backs
/// this with an interactive prompt; tests use a canned answer.
pub trait Chooser: Send + Sync {
    /// Return the zero-based index of the chosen hit, or `None` to give up.
    fn choose(&self, hits: &[SearchHit]) -> Option<usize>;
}

/// Engine construction options, mirroring the CLI surface.
pub struct EngineOptions {
    pub token: Option<String>,
    pub repo_override: Option<String>,
    pub fixed_manifests: bool,
    pub endpoints: Endpoints,
    /// Pre-resolved Steam directory; `None` consults the local probe.
    pub install_dir: Option<PathBuf>,
    /// Courtesy pause between recursive DLC branch fetches.
    pub dlc_delay: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            token: None,
            repo_override: None,
            fixed_manifests: false,
            endpoints: Endpoints::default(),
            install_dir: None,
            dlc_delay: DLC_FETCH_DELAY,
        }
    }
}

pub struct Engine {
    github: GithubClient,
    store: SteamStoreClient,
    options: EngineOptions,
    state: Mutex<Option<GatherState>>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Result<Self> {
        let fetcher = Fetcher::new(options.token.clone())
            .context("failed to build the HTTP client")?;
        Ok(Self::with_fetcher(options, fetcher))
    }

    /// Build an engine around an explicit fetcher (tests shrink the retry
    /// policy this way).
    pub fn with_fetcher(options: EngineOptions, fetcher: Fetcher) -> Self {
        let github = GithubClient::new(fetcher.clone(), options.endpoints.clone());
        let store = SteamStoreClient::new(fetcher, options.endpoints.clone());
        Self {
            github,
            store,
            options,
            state: Mutex::new(None),
        }
    }

    /// Run the full pipeline for one identifier (numeric id or store name).
    pub async fn run(&self, input: &str, chooser: &dyn Chooser) -> Result<()> {
        let app_id = self.resolve_identifier(input, chooser).await?;

        // Prerequisites: a valid Steam directory and remaining API quota.
        let install = match &self.options.install_dir {
            Some(dir) => dir.clone(),
            None => steam_path::locate().context("Steam installation not found")?,
        };
        self.verify_rate_limit().await?;

        let mut repos: Vec<String> = Vec::new();
        if let Some(repo) = &self.options.repo_override {
            repos.push(repo.clone());
        }
        repos.extend(config::DEFAULT_REPOS.iter().map(|r| r.to_string()));

        let repo = resolve::resolve_repository(&self.github, &repos, &app_id)
            .await
            .ok_or_else(|| anyhow!("no repository carries app {app_id}"))?;

        *self.state.lock().unwrap() = Some(GatherState::new(&app_id));
        self.process_branch(&repo, app_id, &install, false).await
    }

    /// Resolve the caller's input to a numeric app id, going through store
    /// search when it is not already numeric.
    async fn resolve_identifier(&self, input: &str, chooser: &dyn Chooser) -> Result<String> {
        let input = input.trim();
        if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
            return Ok(input.to_string());
        }

        let hits = self.store.search(input).await;
        if hits.is_empty() {
            bail!("no store results for \"{input}\"");
        }
        info!("store search results:");
        for (idx, hit) in hits.iter().enumerate() {
            info!("  {}. [{}] [{}] {}", idx + 1, hit.id, hit.kind, hit.name);
        }
        let selected = if hits.len() == 1 {
            &hits[0]
        } else {
            let idx = chooser
                .choose(&hits)
                .ok_or_else(|| anyhow!("no selection made"))?;
            hits.get(idx).ok_or_else(|| anyhow!("selection out of range"))?
        };
        info!("selected: [{}] {}", selected.id, selected.name);
        Ok(selected.id.to_string())
    }

    /// Fatal when the API quota is exhausted; probe failures are only
    /// warnings since the run may still succeed.
    async fn verify_rate_limit(&self) -> Result<()> {
        match self.github.check_rate_limit().await {
            Ok(Some(limit)) if limit.remaining == 0 => {
                let reset = Local
                    .timestamp_opt(limit.reset, 0)
                    .single()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| limit.reset.to_string());
                bail!("API rate limit exhausted, resets at {reset}");
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("rate limit check failed: {e}");
                Ok(())
            }
        }
    }

    /// Process one branch: its own depot entry, every file in its tree
    /// through the worker pool, then DLC expansion. Only the root branch
    /// finalizes; DLC failures never abort siblings.
    fn process_branch<'a>(
        &'a self,
        repo: &'a str,
        branch: String,
        install: &'a std::path::Path,
        is_dlc: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // Every processed branch is itself a depot, key or not.
            if let Ok(depot_id) = branch.parse::<u32>() {
                self.with_state(|s| s.add_depot(depot_id, None));
            }

            let info = match self.github.branch_info(repo, &branch).await {
                Ok(Some(info)) => info,
                Ok(None) => {
                    warn!("branch {branch} not found in repository {repo}");
                    if is_dlc {
                        return Ok(());
                    }
                    bail!("branch {branch} not found in repository {repo}");
                }
                Err(e) => {
                    warn!("branch lookup failed for {branch}: {e}");
                    if is_dlc {
                        return Ok(());
                    }
                    bail!("branch lookup failed for {branch}: {e}");
                }
            };

            let files = match self.github.tree(&info.tree_url).await {
                Ok(Some(files)) => files,
                Ok(None) | Err(_) => {
                    warn!("no file tree for branch {branch}");
                    if is_dlc {
                        return Ok(());
                    }
                    bail!("no file tree for branch {branch}");
                }
            };
            let has_dlc_config = files.iter().any(|f| f.path == CONFIG_JSON);

            // One task per file, at most MAX_WORKERS in flight. Each task
            // carries the same timeout as a single HTTP request; the first
            // timeout abandons the whole branch.
            let mut tasks = stream::iter(files.into_iter().map(|file| {
                let path = file.path;
                let branch = branch.clone();
                async move {
                    let result = tokio::time::timeout(
                        REQUEST_TIMEOUT,
                        self.process_file(repo, &branch, &path, install),
                    )
                    .await;
                    (path, result)
                }
            }))
            .buffer_unordered(MAX_WORKERS);

            let mut all_ok = true;
            let mut abandoned = false;
            while let Some((path, result)) = tasks.next().await {
                match result {
                    Err(_) => {
                        error!("file task timed out, abandoning branch {branch} ({path})");
                        abandoned = true;
                        break;
                    }
                    Ok(Err(e)) => {
                        error!("processing {path} failed: {e:#}");
                        all_ok = false;
                    }
                    Ok(Ok(())) => {}
                }
            }
            drop(tasks);
            if abandoned {
                if is_dlc {
                    return Ok(());
                }
                bail!("branch {branch} abandoned after a task timeout");
            }

            // No DLC document in the tree: fall back to the store catalog.
            if !has_dlc_config {
                info!("no DLC config in branch {branch}, querying the store");
                let dlc_ids = self.store_dlc_ids(&branch, !is_dlc).await;
                if !dlc_ids.is_empty() {
                    info!("DLC detected for {branch}: {dlc_ids:?}");
                }
                for dlc in dlc_ids {
                    tokio::time::sleep(self.options.dlc_delay).await;
                    if let Err(e) = self
                        .process_branch(repo, dlc.to_string(), install, true)
                        .await
                    {
                        warn!("DLC branch {dlc} failed: {e:#}");
                    }
                }
            }

            if !is_dlc {
                if !all_ok {
                    bail!("branch {branch} had failing file tasks, nothing persisted");
                }
                let state = self
                    .state
                    .lock()
                    .unwrap()
                    .clone()
                    .expect("state initialized by run()");
                store_lua(&state, install, self.options.fixed_manifests)
                    .context("failed to persist the generated configuration")?;
                info!(
                    "stored {:?}, branch last updated {}",
                    state.app_names, info.commit_date
                );
            }
            Ok(())
        })
    }

    /// Store-catalog DLC fallback. The root branch's lookup also records
    /// the display name the details payload carries; DLC lookups must not,
    /// or a DLC's name could end up as the root app's header.
    async fn store_dlc_ids(&self, app_id: &str, record_name: bool) -> Vec<u32> {
        match self.store.app_details(app_id).await {
            Some(details) => {
                self.with_state(|s| {
                    if record_name {
                        s.set_display_name(&details.name);
                    }
                    for dlc in &details.dlc {
                        s.add_depot(*dlc, None);
                    }
                });
                details.dlc
            }
            None => Vec::new(),
        }
    }

    /// Classify one tree entry by name and handle it. Download
    /// unavailability (retries exhausted) is consumed as absence; parse and
    /// filesystem errors fail the task.
    async fn process_file(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
        install: &std::path::Path,
    ) -> Result<()> {
        debug!("processing file: {path}");
        if path.ends_with(MANIFEST_SUFFIX) {
            self.store_manifest(repo, branch, path, install).await
        } else if path.ends_with(".vdf") {
            if path == APPINFO_VDF {
                self.handle_appinfo(repo, branch, path).await
            } else if path.eq_ignore_ascii_case(KEY_VDF) {
                self.handle_key_list(repo, branch, path).await
            } else {
                Ok(())
            }
        } else if path == CONFIG_JSON {
            self.handle_dlc_config(repo, branch, path, install).await
        } else {
            Ok(())
        }
    }

    /// Download a manifest payload into Steam's depot cache. Idempotent:
    /// an already cached manifest is left alone.
    async fn store_manifest(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
        install: &std::path::Path,
    ) -> Result<()> {
        if let Some(reference) = ManifestRef::parse(path) {
            self.with_state(|s| s.manifests.push(reference));
        }

        let target = steam_path::depot_cache(install).join(path);
        if target.exists() {
            warn!("manifest already cached: {path}");
            return Ok(());
        }

        let Some(bytes) = self.download(repo, branch, path).await else {
            return Ok(());
        };
        writer::write_atomic(&target, &bytes)
            .with_context(|| format!("failed to store manifest {path}"))?;
        info!("manifest downloaded: {path}");
        Ok(())
    }

    async fn handle_appinfo(&self, repo: &str, branch: &str, path: &str) -> Result<()> {
        let Some(bytes) = self.download(repo, branch, path).await else {
            return Ok(());
        };
        let text = String::from_utf8_lossy(&bytes);
        let name = vdf::app_name(&text).context("failed to parse appinfo.vdf")?;
        if let Some(name) = name {
            self.with_state(|s| s.set_display_name(&name));
        }
        Ok(())
    }

    async fn handle_key_list(&self, repo: &str, branch: &str, path: &str) -> Result<()> {
        let Some(bytes) = self.download(repo, branch, path).await else {
            return Ok(());
        };
        let text = String::from_utf8_lossy(&bytes);
        let keys = vdf::depot_keys(&text).context("failed to parse key.vdf")?;
        if !keys.is_empty() {
            info!("decryption keys found in {path}");
            self.with_state(|s| {
                for (depot_id, key) in keys {
                    s.add_depot(depot_id, Some(key));
                }
            });
        }
        Ok(())
    }

    /// The branch's own DLC document: plain DLC ids become keyless depots,
    /// packaged DLC ids are full branches processed synchronously here.
    async fn handle_dlc_config(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
        install: &std::path::Path,
    ) -> Result<()> {
        let Some(bytes) = self.download(repo, branch, path).await else {
            return Ok(());
        };
        let doc: Value = match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                error!("malformed {CONFIG_JSON} in branch {branch}: {e}");
                return Ok(());
            }
        };

        let ids = |key: &str| -> Vec<u32> {
            doc.get(key)
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_u64().map(|id| id as u32))
                        .collect()
                })
                .unwrap_or_default()
        };

        let dlcs = ids("dlcs");
        if !dlcs.is_empty() {
            info!("DLC listed in {CONFIG_JSON}: {dlcs:?}");
            self.with_state(|s| {
                for dlc in &dlcs {
                    s.add_depot(*dlc, None);
                }
            });
        }

        let packaged = ids("packagedlcs");
        if !packaged.is_empty() {
            info!("standalone DLC listed in {CONFIG_JSON}: {packaged:?}");
            for dlc in packaged {
                if let Err(e) = self
                    .process_branch(repo, dlc.to_string(), install, true)
                    .await
                {
                    warn!("packaged DLC branch {dlc} failed: {e:#}");
                }
            }
        }
        Ok(())
    }

    /// Raw download where exhausted retries degrade to absence: the file is
    /// simply unavailable, which is not the task's failure.
    async fn download(&self, repo: &str, branch: &str, path: &str) -> Option<Vec<u8>> {
        match self.github.download_raw(repo, branch, path).await {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => {
                warn!("file vanished from branch {branch}: {path}");
                None
            }
            Err(e) => {
                warn!("download failed for {path}: {e}");
                None
            }
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut GatherState) -> R) -> R {
        let mut guard = self.state.lock().unwrap();
        let state = guard.as_mut().expect("state initialized by run()");
        f(state)
    }
}
