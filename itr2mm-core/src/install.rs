use crate::archive::ArchiveReader;
use crate::classify::classify_entry;
use crate::error::ModResult;
use crate::logging::ProgressThrottle;
use crate::paths::{category_folder, ensure_category_folders, Category, InstallRoot};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub files_written: usize,
    pub bytes_written: u64,
    pub per_category: BTreeMap<&'static str, usize>,
    pub written: Vec<PathBuf>,
}

/// Extract every file of `archive_path` into its category folder under `root`.
///
/// Not transactional: a failing entry aborts the install and leaves already
/// written files in place.
pub fn install_archive(archive_path: &Path, root: &InstallRoot, mut progress_cb: impl FnMut(&str, u8)) -> ModResult<InstallReport> {
    let mut progress = |m: &str, pct: u8| { debug!("{}", m); progress_cb(m, pct); };
    progress("Starting install", 0);
    ensure_category_folders(root)?;

    progress("Reading archive", 5);
    let mut reader = ArchiveReader::open(archive_path)?;
    let files: Vec<_> = reader.files().cloned().collect();

    let mut report = InstallReport::default();
    let mut throttle = ProgressThrottle::new(150);
    let total = files.len().max(1);
    for (i, entry) in files.iter().enumerate() {
        let Some(target) = classify_entry(&entry.path) else { continue };
        let dest = category_folder(root, target.category).join(&target.relative_path);
        let bytes = reader.write_entry_to(entry, &dest)?;
        debug!("{} -> {}", entry.path, dest.display());

        report.files_written += 1;
        report.bytes_written += bytes;
        *report.per_category.entry(target.category.folder_name()).or_default() += 1;
        report.written.push(dest);

        let pct = 5 + (((i as f32 + 1.0) / total as f32) * 90.0) as u8;
        throttle.emit("Extracting:", format!("Extracting: {}", entry.path), pct.min(95), |m, p| progress(m, p));
    }

    info!(
        "installed {} file(s) ({}) from {}",
        report.files_written,
        humansize::format_size(report.bytes_written, humansize::BINARY),
        archive_path.display()
    );
    progress("Install complete", 100);
    Ok(report)
}

impl InstallReport {
    pub fn count(&self, category: Category) -> usize {
        self.per_category.get(category.folder_name()).copied().unwrap_or(0)
    }
}
