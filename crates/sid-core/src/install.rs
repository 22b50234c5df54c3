//! Locates a SimpleID installation on the local filesystem.

use std::path::{Path, PathBuf};

/// Entry-point script expected directly under the installation root.
pub const ENTRY_POINT_FILE: &str = "index.php";

/// Configuration file name searched for under the root and `conf/`.
pub const CONFIG_FILE_NAME: &str = "config.php";

/// A validated installation: the entry point exists under `root_dir` and a
/// configuration file was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInstallation {
    pub root_dir: PathBuf,
    pub config_file: PathBuf,
}

/// Finds the configuration file for `dir`: first `dir/config.php`, then
/// `dir/conf/config.php`. Only direct children are considered; the first
/// match by this precedence wins.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    for candidate in [
        dir.join(CONFIG_FILE_NAME),
        dir.join("conf").join(CONFIG_FILE_NAME),
    ] {
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Checks whether `root_dir` holds a usable installation.
///
/// Absence is an ordinary `None`, not an error; callers decide whether a
/// missing installation is fatal.
pub fn locate_installation(root_dir: &Path) -> Option<HostInstallation> {
    if !root_dir.join(ENTRY_POINT_FILE).is_file() {
        return None;
    }
    let config_file = find_config_file(root_dir)?;
    Some(HostInstallation {
        root_dir: root_dir.to_path_buf(),
        config_file,
    })
}
