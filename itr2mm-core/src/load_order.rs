use crate::error::{IoResultExt, ModError, ModResult};
use crate::state::{is_active_payload, RenameFailure};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

static ORDER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{3})_").expect("valid prefix regex"));

/// A validated load-order number, always rendered as three digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadOrder(u16);

impl LoadOrder {
    /// Parse user input: 1 to 3 ASCII digits, blank means "no order".
    pub fn parse(input: &str) -> ModResult<Option<LoadOrder>> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed.len() > 3 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ModError::InvalidOrder(input.to_string()));
        }
        trimmed
            .parse::<u16>()
            .map(|n| Some(LoadOrder(n)))
            .map_err(|_| ModError::InvalidOrder(input.to_string()))
    }

    pub fn padded(self) -> String {
        format!("{:03}", self.0)
    }
}

/// File name without a leading `NNN_` prefix.
pub fn strip_order_prefix(name: &str) -> &str {
    match ORDER_PREFIX.find(name) {
        Some(m) => &name[m.end()..],
        None => name,
    }
}

fn ordered_name(name: &str, order: Option<LoadOrder>) -> String {
    let base = strip_order_prefix(name);
    match order {
        Some(order) => format!("{}_{}", order.padded(), base),
        None => base.to_string(),
    }
}

/// Apply (or clear, with `None`) the load-order prefix on every payload file under `folder`.
///
/// Best-effort: a failed rename is logged and reported, the other files are still renamed.
pub fn set_order(folder: &Path, order: Option<LoadOrder>) -> Vec<RenameFailure> {
    let mut failures = Vec::new();
    let files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("walk {}: {err}", folder.display());
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    let mut renamed = 0usize;
    for file in files {
        let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else { continue };
        if !is_active_payload(&name) {
            continue;
        }
        let new_name = ordered_name(&name, order);
        if new_name == name {
            continue;
        }
        let target = file.with_file_name(&new_name);
        if target.symlink_metadata().is_ok() {
            warn!("not renaming {}: {} already exists", file.display(), new_name);
            failures.push(RenameFailure { path: file, message: format!("target {new_name} already exists") });
            continue;
        }
        match fs::rename(&file, &target) {
            Ok(()) => renamed += 1,
            Err(e) => {
                warn!("rename {} -> {}: {e}", file.display(), new_name);
                failures.push(RenameFailure { path: file, message: e.to_string() });
            }
        }
    }
    info!(
        "load order {} on {}: {} renamed, {} failed",
        order.map(LoadOrder::padded).unwrap_or_else(|| "cleared".into()),
        folder.display(),
        renamed,
        failures.len()
    );
    failures
}

/// Prefix of the first top-level `.pak` carrying one, to pre-fill an order field.
pub fn get_default_order(folder: &Path) -> ModResult<Option<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(folder).at(folder)? {
        let entry = entry.at(folder)?;
        if entry.file_type().at(entry.path())?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names
        .iter()
        .filter(|n| n.to_ascii_lowercase().ends_with(".pak"))
        .find_map(|n| ORDER_PREFIX.captures(n).map(|c| c[1].to_string())))
}

/// Leaf folders (no subfolders) under `category_root`, in case-insensitive path order.
pub fn orderable_folders(category_root: &Path) -> Vec<PathBuf> {
    WalkDir::new(category_root)
        .min_depth(1)
        .sort_by(|a, b| a.file_name().to_ascii_lowercase().cmp(&b.file_name().to_ascii_lowercase()))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .filter(|e| {
            fs::read_dir(e.path())
                .map(|mut it| !it.any(|c| c.map(|c| c.path().is_dir()).unwrap_or(false)))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect()
}
