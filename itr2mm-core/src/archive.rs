use crate::error::{IoResultExt, ModError, ModResult};
use crate::logging::ProgressThrottle;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

/// One member of an opened archive, with a normalized `/`-separated path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    index: usize,
}

impl ArchiveEntry {
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/')
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Read-only view over a zip archive on disk.
pub struct ArchiveReader {
    path: PathBuf,
    zip: ZipArchive<File>,
    entries: Vec<ArchiveEntry>,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> ModResult<Self> {
        let file = File::open(path).map_err(|e| ModError::archive(path, e))?;
        let mut zip = ZipArchive::new(file).map_err(|e| ModError::archive(path, e))?;
        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let member = zip.by_index_raw(index).map_err(|e| ModError::archive(path, e))?;
            let raw = member.name().to_string();
            let Some(normalized) = normalize_entry_name(&raw).map_err(|m| ModError::archive(path, m))? else {
                continue;
            };
            entries.push(ArchiveEntry {
                path: normalized,
                is_dir: member.is_dir() || raw.ends_with('/') || raw.ends_with('\\'),
                size: member.size(),
                index,
            });
        }
        debug!("opened {} ({} entries)", path.display(), entries.len());
        Ok(Self { path: path.to_path_buf(), zip, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn files(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|e| !e.is_dir)
    }

    /// Entries whose path satisfies `pred`.
    pub fn find<F: Fn(&str) -> bool>(&self, pred: F) -> Vec<ArchiveEntry> {
        self.entries.iter().filter(|e| pred(&e.path)).cloned().collect()
    }

    pub fn read(&mut self, entry: &ArchiveEntry) -> ModResult<Vec<u8>> {
        let mut member = self
            .zip
            .by_index(entry.index)
            .map_err(|e| ModError::archive(&self.path, format!("{}: {e}", entry.path)))?;
        let mut buf = Vec::with_capacity(entry.size as usize);
        member
            .read_to_end(&mut buf)
            .map_err(|e| ModError::archive(&self.path, format!("{}: {e}", entry.path)))?;
        Ok(buf)
    }

    /// Write one file entry verbatim to `dest`, creating parents and overwriting.
    pub fn write_entry_to(&mut self, entry: &ArchiveEntry, dest: &Path) -> ModResult<u64> {
        let data = self.read(entry)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        fs::write(dest, &data).at(dest)?;
        Ok(data.len() as u64)
    }

    /// Extract every member under `dest`, keeping the archive layout.
    pub fn extract_all(&mut self, dest: &Path, mut progress: impl FnMut(&str, u8)) -> ModResult<usize> {
        fs::create_dir_all(dest).at(dest)?;
        let mut throttle = ProgressThrottle::new(150);
        let entries = self.entries.clone();
        let total = entries.len().max(1);
        let mut written = 0usize;
        for (i, entry) in entries.iter().enumerate() {
            let out = dest.join(&entry.path);
            if entry.is_dir {
                fs::create_dir_all(&out).at(&out)?;
            } else {
                self.write_entry_to(entry, &out)?;
                written += 1;
            }
            let pct = (((i + 1) as f32 / total as f32) * 100.0) as u8;
            throttle.emit("Extracting:", format!("Extracting: {}", entry.path), pct, |m, p| progress(m, p));
        }
        info!("extracted {} file(s) from {} into {}", written, self.path.display(), dest.display());
        Ok(written)
    }
}

/// Normalize a raw member name to `/`-separated segments.
///
/// Returns `Ok(None)` for names that carry no path at all and an error for
/// names that would escape the extraction root.
pub fn normalize_entry_name(raw: &str) -> Result<Option<String>, String> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') || unified.split('/').next().is_some_and(|s| s.ends_with(':')) {
        return Err(format!("absolute entry path {raw:?}"));
    }
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(format!("entry path {raw:?} escapes the archive root")),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Ok(None);
    }
    Ok(Some(segments.join("/")))
}
