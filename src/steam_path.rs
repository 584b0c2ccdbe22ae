//! Local Steam installation probe.
//!
//! Windows-only by design: the install path comes from
//! `HKCU\Software\Valve\Steam\SteamPath`. The `STEAM_PATH` environment
//! variable overrides the registry on every platform, which is also what
//! keeps the rest of the tool testable off-Windows.

use crate::config::STEAM_EXE;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Locate and validate the Steam installation directory.
///
/// A directory only counts when `steam.exe` is present in it. Returns
/// `None` when no valid installation is found; callers treat that as fatal.
pub fn locate() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("STEAM_PATH") {
        return validate(PathBuf::from(path));
    }
    registry_path().and_then(validate)
}

fn validate(path: PathBuf) -> Option<PathBuf> {
    if path.join(STEAM_EXE).is_file() {
        info!("Steam installation located: {}", path.display());
        Some(path)
    } else {
        error!(
            "Steam installation directory failed validation: {}",
            path.display()
        );
        None
    }
}

#[cfg(windows)]
fn registry_path() -> Option<PathBuf> {
    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let steam = match hkcu.open_subkey("Software\\Valve\\Steam") {
        Ok(key) => key,
        Err(_) => {
            error!("no Steam installation found in the registry");
            return None;
        }
    };
    let path: String = steam.get_value("SteamPath").ok()?;
    Some(PathBuf::from(path))
}

#[cfg(not(windows))]
fn registry_path() -> Option<PathBuf> {
    error!("Steam discovery requires Windows; set STEAM_PATH to override");
    None
}

/// Steam's manifest cache directory under an install.
pub fn depot_cache(install: &Path) -> PathBuf {
    install.join(crate::config::DEPOT_CACHE_DIR)
}

/// Steam's generated-script directory under an install.
pub fn plugin_dir(install: &Path) -> PathBuf {
    install.join(crate::config::PLUGIN_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_steam_exe() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate(dir.path().to_path_buf()).is_none());

        std::fs::write(dir.path().join(STEAM_EXE), b"").unwrap();
        assert_eq!(
            validate(dir.path().to_path_buf()),
            Some(dir.path().to_path_buf())
        );
    }
}
