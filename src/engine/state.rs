//! Shared accumulator for one top-level acquisition run.
//!
//! Every concurrent file task and every recursive DLC branch appends into
//! the same `GatherState`, which the engine owns behind a single mutex.
//! Nothing here is deduplicated until Finalize.

/// One discovered depot, possibly with its decryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepotRecord {
    pub depot_id: u32,
    pub decryption_key: Option<String>,
}

/// A parsed manifest filename of the form `<depot_id>_<manifest_id>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRef {
    pub depot_id: u32,
    pub manifest_id: String,
}

impl ManifestRef {
    /// Parse a manifest filename. `None` when the name does not follow the
    /// `<depot>_<manifest>.<ext>` pattern.
    pub fn parse(filename: &str) -> Option<Self> {
        let (depot, rest) = filename.split_once('_')?;
        let depot_id = depot.parse::<u32>().ok()?;
        let manifest_id = rest.split('.').next().unwrap_or(rest);
        if manifest_id.is_empty() {
            return None;
        }
        Some(Self {
            depot_id,
            manifest_id: manifest_id.to_string(),
        })
    }
}

/// Accumulated run state shared across file tasks and DLC recursion.
#[derive(Debug, Clone)]
pub struct GatherState {
    /// Index 0 is the identifier the run started from; index 1, when
    /// present, is the display name discovered later. Index 0 doubles as
    /// the output filename stem.
    pub app_names: Vec<String>,
    pub depots: Vec<DepotRecord>,
    pub manifests: Vec<ManifestRef>,
}

impl GatherState {
    pub fn new(app_id: &str) -> Self {
        Self {
            app_names: vec![app_id.to_string()],
            depots: Vec::new(),
            manifests: Vec::new(),
        }
    }

    pub fn add_depot(&mut self, depot_id: u32, decryption_key: Option<String>) {
        self.depots.push(DepotRecord {
            depot_id,
            decryption_key,
        });
    }

    /// Record the display name once; later discoveries are ignored so the
    /// root app's name is never clobbered by a DLC lookup.
    pub fn set_display_name(&mut self, name: &str) {
        if self.app_names.len() == 1 && !name.is_empty() {
            self.app_names.push(name.to_string());
        }
    }
}
