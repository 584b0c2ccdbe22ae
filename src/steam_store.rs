//! Steam store catalog client.
//!
//! Used for two fallbacks only: resolving a non-numeric identifier through
//! store search, and discovering DLC ids when a branch ships no
//! `config.json`. Failures here are logged and degrade to empty results;
//! they never abort the engine.

use crate::config::Endpoints;
use crate::fetch::Fetcher;
use serde::Deserialize;
use tracing::warn;

/// One store search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// The subset of app details the engine consumes.
#[derive(Debug, Clone, Default)]
pub struct AppDetails {
    pub name: String,
    pub dlc: Vec<u32>,
}

#[derive(Clone)]
pub struct SteamStoreClient {
    fetcher: Fetcher,
    endpoints: Endpoints,
}

impl SteamStoreClient {
    pub fn new(fetcher: Fetcher, endpoints: Endpoints) -> Self {
        Self { fetcher, endpoints }
    }

    /// Search the store by name. Empty on any absence or malformed payload.
    pub async fn search(&self, term: &str) -> Vec<SearchHit> {
        let url = self.endpoints.store_search(term);
        let body = match self.fetcher.get_json(&url).await {
            Ok(Some(v)) => v,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("store search failed: {e}");
                return Vec::new();
            }
        };
        match body.get("items") {
            Some(items) => serde_json::from_value(items.clone()).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Fetch app details, unwrapping the `{ "<id>": { success, data } }`
    /// envelope the store responds with.
    pub async fn app_details(&self, app_id: &str) -> Option<AppDetails> {
        let url = self.endpoints.app_details(app_id);
        let body = match self.fetcher.get_json(&url).await {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                warn!("app details request failed: {e}");
                return None;
            }
        };
        let entry = body.get(app_id)?;
        if !entry["success"].as_bool().unwrap_or(false) {
            warn!("store has no details for app {app_id}");
            return None;
        }
        let data = &entry["data"];
        let name = data["name"].as_str().unwrap_or_default().to_string();
        let dlc = data["dlc"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_u64().map(|id| id as u32))
                    .collect()
            })
            .unwrap_or_default();
        Some(AppDetails { name, dlc })
    }
}
