//! Output composition and atomic persistence.
//!
//! Everything written to the Steam directory goes through
//! [`write_atomic`]: bytes land in a `.tmp` sibling first and are renamed
//! over the destination, so a crashed writer can never leave a truncated
//! manifest or Lua script at the final path.

use crate::engine::state::{DepotRecord, GatherState};
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

/// Collapse accumulated depot records to one per depot id.
///
/// A keyed record always beats a keyless one; among several keyed records
/// the last accumulated wins. The result is sorted ascending by depot id.
pub fn dedupe_depots(records: &[DepotRecord]) -> Vec<DepotRecord> {
    let mut merged: std::collections::BTreeMap<u32, Option<String>> =
        std::collections::BTreeMap::new();
    for record in records {
        let entry = merged.entry(record.depot_id).or_insert(None);
        if record.decryption_key.is_some() || entry.is_none() {
            entry.clone_from(&record.decryption_key);
        }
    }
    merged
        .into_iter()
        .map(|(depot_id, decryption_key)| DepotRecord {
            depot_id,
            decryption_key,
        })
        .collect()
}

/// Compose the Lua script for the accumulated state.
///
/// Format: optional `-- <display name>` header, one `addappid` line per
/// deduplicated depot, and in fixed-manifest mode one `setManifestid` line
/// per collected manifest reference, sorted by depot id.
pub fn compose_lua(state: &GatherState, fixed: bool) -> String {
    let mut out = String::new();
    if let Some(name) = state.app_names.get(1) {
        out.push_str(&format!("-- {name}\n"));
    }
    for depot in dedupe_depots(&state.depots) {
        match &depot.decryption_key {
            Some(key) => out.push_str(&format!("addappid({}, 1, \"{key}\")\n", depot.depot_id)),
            None => out.push_str(&format!("addappid({}, 1)\n", depot.depot_id)),
        }
    }
    if fixed {
        let mut refs = state.manifests.clone();
        refs.sort_by_key(|m| m.depot_id);
        for m in refs {
            out.push_str(&format!(
                "setManifestid({}, \"{}\")\n",
                m.depot_id, m.manifest_id
            ));
        }
    }
    out
}

/// Write bytes to `path` through a temporary sibling plus atomic rename.
/// Parent directories are created as needed; a failed write removes the
/// temporary file and leaves any existing destination untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Persist the aggregate state as `<app>.lua` under the plugin directory.
pub fn store_lua(state: &GatherState, install: &Path, fixed: bool) -> io::Result<()> {
    let script = compose_lua(state, fixed);
    let path = crate::steam_path::plugin_dir(install).join(format!("{}.lua", state.app_names[0]));
    write_atomic(&path, script.as_bytes())?;
    info!("configuration saved: {}", path.display());
    Ok(())
}
