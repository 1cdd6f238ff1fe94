use crate::archive::ArchiveReader;
use crate::error::{IoResultExt, ModError, ModResult};
use crate::fs_util::replace_dir;
use crate::manifest::{locate_manifest_folder, read_info_lenient, read_module_config, InstallStep, ManifestFolder, PackageInfo, Plugin};
use crate::paths::{category_folder, ensure_category_folders, Category, InstallRoot};
use crate::sentinel::{write_sentinel, SentinelKind};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Chosen plugin titles, keyed by install step name.
pub type Selection = HashMap<String, Vec<String>>;

/// Where a guided package install currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStage {
    SelectArchive,
    LocateManifestFolder,
    ParseManifests,
    PerStepSelection,
    ConfirmModName,
    CopySelectedFiles,
    WriteSentinels,
    Done,
    Aborted,
}

impl PackageStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, PackageStage::Done | PackageStage::Aborted)
    }
}

impl fmt::Display for PackageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PackageReport {
    pub mod_folder: PathBuf,
    pub groups_copied: usize,
    pub bytes_copied: u64,
    pub destinations: Vec<PathBuf>,
    pub modules_marked: usize,
}

/// One guided install of a package archive.
///
/// The archive is extracted into a private staging folder on [`open`](Self::open);
/// that folder is removed when the session finishes, aborts, or is dropped.
pub struct PackageSession {
    archive: PathBuf,
    staging: Option<TempDir>,
    manifest: ManifestFolder,
    info: PackageInfo,
    steps: Vec<InstallStep>,
    selection: Selection,
    mod_name: Option<String>,
    stage: PackageStage,
}

impl PackageSession {
    /// Extract `archive` under `temp_folder` and parse its manifests.
    pub fn open(archive: &Path, temp_folder: &Path) -> ModResult<Self> {
        if temp_folder.as_os_str().is_empty() {
            return Err(ModError::config("temporary folder is not set"));
        }
        fs::create_dir_all(temp_folder).at(temp_folder)?;
        let staging = tempfile::Builder::new().prefix("package-").tempdir_in(temp_folder).at(temp_folder)?;
        debug!("staging {} in {}", archive.display(), staging.path().display());

        let mut reader = ArchiveReader::open(archive)?;
        reader.extract_all(staging.path(), |_, _| {})?;

        let manifest = locate_manifest_folder(staging.path()).map_err(|e| match e {
            ModError::Archive { message, .. } => ModError::archive(archive, message),
            other => other,
        })?;
        let info = read_info_lenient(manifest.info.as_deref());
        let steps = read_module_config(&manifest)?;
        info!(
            "opened package {} ({:?}, {} step(s))",
            archive.display(),
            info.title,
            steps.len()
        );

        Ok(Self {
            archive: archive.to_path_buf(),
            staging: Some(staging),
            manifest,
            info,
            steps,
            selection: Selection::new(),
            mod_name: None,
            stage: PackageStage::PerStepSelection,
        })
    }

    pub fn stage(&self) -> PackageStage {
        self.stage
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn info(&self) -> &PackageInfo {
        &self.info
    }

    /// Title from `info.xml`; empty when it was missing or unreadable.
    pub fn suggested_mod_name(&self) -> &str {
        &self.info.title
    }

    pub fn steps(&self) -> &[InstallStep] {
        &self.steps
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Staging folder while the session is live.
    pub fn staging_root(&self) -> Option<&Path> {
        self.staging.as_ref().map(TempDir::path)
    }

    /// Absolute path of a plugin's preview image, if it exists in the package.
    pub fn plugin_image(&self, plugin: &Plugin) -> Option<PathBuf> {
        let staging = self.staging_root()?;
        let rel = plugin.image_relative_path.as_deref()?;
        let segments = split_segments(rel).ok()?;
        resolve_case_insensitive(self.manifest.package_root(), &segments)
            .or_else(|| resolve_case_insensitive(staging, &segments))
            .filter(|p| p.is_file())
    }

    fn expect_stage(&self, allowed: &[PackageStage], action: &str) -> ModResult<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(ModError::config(format!("cannot {action} while the package install is at {}", self.stage)))
        }
    }

    /// Record the plugins chosen for one step, replacing an earlier choice.
    pub fn select<S: AsRef<str>>(&mut self, step: &str, titles: &[S]) -> ModResult<()> {
        self.expect_stage(&[PackageStage::PerStepSelection], "select plugins")?;
        let install_step = self
            .steps
            .iter()
            .find(|s| s.name == step)
            .ok_or_else(|| ModError::config(format!("package has no install step {step:?}")))?;
        let mut chosen = Vec::with_capacity(titles.len());
        for title in titles {
            let title = title.as_ref();
            if install_step.plugin(title).is_none() {
                return Err(ModError::config(format!("step {step:?} has no plugin {title:?}")));
            }
            if !chosen.iter().any(|c| c == title) {
                chosen.push(title.to_string());
            }
        }
        debug!("step {:?}: selected {:?}", step, chosen);
        self.selection.insert(step.to_string(), chosen);
        Ok(())
    }

    /// Selected plugins in step order, then manifest order.
    pub fn selected_plugins(&self) -> Vec<&Plugin> {
        selected_plugins(&self.steps, &self.selection)
    }

    /// Fix the folder name under `Mods` that receives the package sentinels.
    pub fn confirm_mod_name(&mut self, name: &str) -> ModResult<()> {
        self.expect_stage(&[PackageStage::PerStepSelection, PackageStage::ConfirmModName], "confirm the mod name")?;
        if self.selected_plugins().is_empty() {
            return Err(ModError::config("no plugins selected"));
        }
        let name = validate_mod_name(name)?;
        self.mod_name = Some(name);
        self.stage = PackageStage::ConfirmModName;
        Ok(())
    }

    /// Copy the selected file groups, then mark the install with sentinels.
    ///
    /// Staging is released whatever the outcome; the session ends in
    /// `Done` or `Aborted`.
    pub fn install(&mut self, root: &InstallRoot, progress_cb: impl FnMut(&str, u8)) -> ModResult<PackageReport> {
        self.expect_stage(&[PackageStage::ConfirmModName], "install")?;
        let mod_name = self.mod_name.clone().ok_or_else(|| ModError::config("mod name is not confirmed"))?;
        let staging = self
            .staging
            .as_ref()
            .map(|s| s.path().to_path_buf())
            .ok_or_else(|| ModError::config("staging folder was already released"))?;

        self.stage = PackageStage::CopySelectedFiles;
        let stage = &mut self.stage;
        let outcome = install_selected(&staging, self.manifest.package_root(), &self.steps, &self.selection, root, &mod_name, progress_cb, |s| *stage = s);
        self.release();
        match outcome {
            Ok(report) => {
                self.stage = PackageStage::Done;
                Ok(report)
            }
            Err(e) => {
                warn!("package install of {} failed: {e}", self.archive.display());
                self.stage = PackageStage::Aborted;
                Err(e)
            }
        }
    }

    /// Cancel the session and delete the staging folder.
    pub fn abort(&mut self) {
        if !self.stage.is_terminal() {
            info!("package install of {} cancelled at {}", self.archive.display(), self.stage);
            self.stage = PackageStage::Aborted;
        }
        self.release();
    }

    fn release(&mut self) {
        if let Some(staging) = self.staging.take() {
            let path = staging.path().to_path_buf();
            if let Err(e) = staging.close() {
                warn!("could not remove staging folder {}: {e}", path.display());
            }
        }
    }
}

fn validate_mod_name(name: &str) -> ModResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ModError::config("mod name is empty"));
    }
    if trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
        return Err(ModError::config(format!("mod name {trimmed:?} must be a single folder name")));
    }
    Ok(trimmed.to_string())
}

fn selected_plugins<'a>(steps: &'a [InstallStep], selection: &Selection) -> Vec<&'a Plugin> {
    steps
        .iter()
        .flat_map(|step| {
            let chosen = selection.get(&step.name);
            step.plugins.iter().filter(move |p| chosen.is_some_and(|c| c.iter().any(|t| *t == p.title)))
        })
        .collect()
}

/// Split a manifest path on either separator, dropping empty and `.` segments.
fn split_segments(raw: &str) -> Result<Vec<String>, String> {
    let mut segments = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(format!("path {raw:?} leaves its root")),
            s => segments.push(s.to_string()),
        }
    }
    Ok(segments)
}

/// Walk `segments` below `base`, matching each folder name case-insensitively.
fn resolve_case_insensitive(base: &Path, segments: &[String]) -> Option<PathBuf> {
    let mut current = base.to_path_buf();
    for segment in segments {
        let exact = current.join(segment);
        if exact.exists() {
            current = exact;
            continue;
        }
        let found = fs::read_dir(&current)
            .ok()?
            .flatten()
            .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(segment))?;
        current = found.path();
    }
    Some(current)
}

/// Locate a file-group source folder inside the staged package.
///
/// Tried in order: relative to the package root, relative to the staging
/// root, then any staged folder whose trailing segments match.
fn resolve_source(staging: &Path, package_root: &Path, source: &str) -> ModResult<PathBuf> {
    let missing = || ModError::manifest(format!("source folder {source:?} not found in the package"));
    let segments = split_segments(source).map_err(ModError::manifest)?;
    if segments.is_empty() {
        return Err(missing());
    }
    if let Some(dir) = resolve_case_insensitive(package_root, &segments)
        .or_else(|| resolve_case_insensitive(staging, &segments))
        .filter(|p| p.is_dir())
    {
        return Ok(dir);
    }
    let lowered: Vec<String> = segments.iter().map(|s| s.to_ascii_lowercase()).collect();
    WalkDir::new(staging)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .find(|e| {
            let Ok(rel) = e.path().strip_prefix(staging) else { return false };
            let parts: Vec<String> = rel.iter().map(|p| p.to_string_lossy().to_ascii_lowercase()).collect();
            parts.ends_with(&lowered)
        })
        .map(|e| e.into_path())
        .ok_or_else(missing)
}

/// Installation-root-relative destination; must name a folder below the root.
fn resolve_destination(root: &InstallRoot, destination: &str) -> ModResult<PathBuf> {
    let segments = split_segments(destination).map_err(ModError::manifest)?;
    if segments.is_empty() {
        return Err(ModError::manifest(format!(
            "destination {destination:?} must name a folder below the installation root"
        )));
    }
    Ok(segments.iter().fold(root.path().to_path_buf(), |acc, s| acc.join(s)))
}

/// Copy every file group of the selected plugins out of a staged package,
/// then write the package sentinel at `Mods/<mod_name>` and `module` into each of its
/// immediate subfolders.
///
/// A missing source folder aborts the remaining copies; groups already copied
/// stay in place and no sentinel is written.
#[allow(clippy::too_many_arguments)]
pub fn install_selected(
    staging: &Path,
    package_root: &Path,
    steps: &[InstallStep],
    selection: &Selection,
    root: &InstallRoot,
    mod_name: &str,
    mut progress_cb: impl FnMut(&str, u8),
    mut on_stage: impl FnMut(PackageStage),
) -> ModResult<PackageReport> {
    let mut progress = |m: &str, pct: u8| { debug!("{}", m); progress_cb(m, pct); };
    let mod_name = validate_mod_name(mod_name)?;
    ensure_category_folders(root)?;

    let groups: Vec<_> = selected_plugins(steps, selection).into_iter().flat_map(|p| p.files.iter()).collect();
    let mut report = PackageReport::default();
    let total = groups.len().max(1);
    progress("Copying selected files", 0);
    for (i, group) in groups.iter().enumerate() {
        let src = resolve_source(staging, package_root, &group.source)?;
        let dest = resolve_destination(root, &group.destination)?;
        progress(&format!("Copying: {}", group.source), ((i * 90) / total) as u8);
        report.bytes_copied += replace_dir(&src, &dest, |_, _| {})?;
        info!("copied {} -> {}", group.source, dest.display());
        report.groups_copied += 1;
        report.destinations.push(dest);
    }

    on_stage(PackageStage::WriteSentinels);
    progress("Marking modules", 95);
    let mod_folder = category_folder(root, Category::Mods).join(&mod_name);
    fs::create_dir_all(&mod_folder).at(&mod_folder)?;
    write_sentinel(&mod_folder, SentinelKind::Package)?;
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(&mod_folder).at(&mod_folder)? {
        let entry = entry.at(&mod_folder)?;
        if entry.file_type().at(entry.path())?.is_dir() {
            subdirs.push(entry.path());
        }
    }
    for sub in subdirs {
        if write_sentinel(&sub, SentinelKind::Module)? {
            report.modules_marked += 1;
        }
    }
    report.mod_folder = mod_folder;

    info!(
        "package {} installed: {} group(s), {}, {} module(s) marked",
        mod_name,
        report.groups_copied,
        humansize::format_size(report.bytes_copied, humansize::BINARY),
        report.modules_marked
    );
    progress("Install complete", 100);
    Ok(report)
}
