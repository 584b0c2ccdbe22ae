//! Tool-wide constants, endpoint configuration, and URL builders.

use std::time::Duration;

/// Tool version reported by `--version` and sent in the user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Total timeout applied to a single HTTP attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts per request before the last failure is surfaced.
pub const RETRY_TIMES: u32 = 10;

/// Fixed pause between retry attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Worker pool size for per-file branch processing.
pub const MAX_WORKERS: usize = 4;

/// Courtesy pause between recursive DLC branch fetches.
pub const DLC_FETCH_DELAY: Duration = Duration::from_secs(2);

/// Manifest repositories checked in order, freshest matching branch wins.
pub const DEFAULT_REPOS: &[&str] = &["a-herta/manifest", "SteamAutoCracks/ManifestHub"];

/// Suffix of depot manifest payload files.
pub const MANIFEST_SUFFIX: &str = ".manifest";

/// DLC configuration document inside a branch.
pub const CONFIG_JSON: &str = "config.json";

/// App metadata file carrying the display name.
pub const APPINFO_VDF: &str = "appinfo.vdf";

/// Depot decryption key file (repos also ship `Key.vdf`).
pub const KEY_VDF: &str = "key.vdf";

/// Executable whose presence validates a Steam install directory.
pub const STEAM_EXE: &str = "steam.exe";

/// Manifest cache directory relative to the Steam install.
pub const DEPOT_CACHE_DIR: &str = "config/depotcache";

/// Generated Lua script directory relative to the Steam install.
pub const PLUGIN_DIR: &str = "config/stplug-in";

/// Remote endpoint bases. Kept injectable so integration tests can point
/// every client at a local mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// GitHub REST API base (branch, tree, and rate-limit lookups).
    pub github_api: String,
    /// GitHub raw-content CDN base.
    pub github_raw: String,
    /// Steam store API base (search and app details).
    pub steam_store: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github_api: "https://api.github.com".into(),
            github_raw: "https://raw.githubusercontent.com".into(),
            steam_store: "https://store.steampowered.com/api".into(),
        }
    }
}

impl Endpoints {
    pub fn rate_limit(&self) -> String {
        format!("{}/rate_limit", self.github_api)
    }

    pub fn branch(&self, repo: &str, branch: &str) -> String {
        format!("{}/repos/{repo}/branches/{branch}", self.github_api)
    }

    pub fn raw(&self, repo: &str, branch: &str, path: &str) -> String {
        format!("{}/{repo}/{branch}/{path}", self.github_raw)
    }

    pub fn store_search(&self, term: &str) -> String {
        format!(
            "{}/storesearch/?cc=jp&l=zh&term={}",
            self.steam_store,
            encode(term)
        )
    }

    pub fn app_details(&self, app_id: &str) -> String {
        format!(
            "{}/appdetails?cc=jp&l=zh&appids={}",
            self.steam_store,
            encode(app_id)
        )
    }
}

/// Percent-encode one query-string value.
fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
