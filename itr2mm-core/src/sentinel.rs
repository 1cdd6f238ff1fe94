//! Zero-byte marker files that carry mod state on disk.
//!
//! Presence is the signal; content is never read.

use crate::error::{IoResultExt, ModResult};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentinelKind {
    /// Folder is disabled.
    Off,
    /// Plain mod installed by the basic installer.
    Mod,
    /// Package installed by the guided installer.
    Package,
    /// Sub-component of a package.
    Module,
}

impl SentinelKind {
    /// File name written to disk.
    pub fn file_name(self) -> &'static str {
        match self {
            SentinelKind::Off => "off",
            SentinelKind::Mod => "mod",
            SentinelKind::Package => "fomod",
            SentinelKind::Module => "module",
        }
    }

    /// Every file name recognized as this kind when reading.
    fn recognized_names(self) -> &'static [&'static str] {
        match self {
            SentinelKind::Off => &["off"],
            SentinelKind::Mod => &["mod"],
            SentinelKind::Package => &["fomod", "package"],
            SentinelKind::Module => &["module"],
        }
    }
}

pub fn has_sentinel(dir: &Path, kind: SentinelKind) -> bool {
    kind.recognized_names().iter().any(|name| dir.join(name).is_file())
}

/// Create the marker if it is missing. Returns whether a file was written.
pub fn write_sentinel(dir: &Path, kind: SentinelKind) -> ModResult<bool> {
    if has_sentinel(dir, kind) {
        return Ok(false);
    }
    let path = dir.join(kind.file_name());
    fs::write(&path, b"").at(&path)?;
    Ok(true)
}

/// Remove every recognized marker of `kind`. Returns whether anything was removed.
pub fn remove_sentinel(dir: &Path, kind: SentinelKind) -> ModResult<bool> {
    let mut removed = false;
    for name in kind.recognized_names() {
        let path = dir.join(name);
        if path.is_file() {
            fs::remove_file(&path).at(&path)?;
            removed = true;
        }
    }
    Ok(removed)
}
