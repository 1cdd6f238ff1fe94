use crate::error::{ModError, ModResult};
use crate::scanner::{ModId, ModKind, ModTree};
use crate::sentinel::{has_sentinel, remove_sentinel, write_sentinel, SentinelKind};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Extensions the game loads as mod payload.
pub const PAYLOAD_EXTENSIONS: [&str; 3] = [".pak", ".ucas", ".utoc"];
/// Appended to payload file names while a mod is disabled.
pub const DISABLED_SUFFIX: &str = ".off";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleResult {
    Enabled,
    Disabled,
    NoOp,
}

/// One file or marker that could not be changed during a best-effort pass.
#[derive(Debug, Clone)]
pub struct RenameFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ToggleReport {
    pub result: ToggleResult,
    pub failures: Vec<RenameFailure>,
}

/// True for an active payload file name (`x.pak`, `x.UTOC`), false for disabled ones.
pub fn is_active_payload(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PAYLOAD_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// True for a disabled payload file name (`x.pak.off`).
pub fn is_disabled_payload(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PAYLOAD_EXTENSIONS.iter().any(|ext| lower.ends_with(&format!("{ext}{DISABLED_SUFFIX}")))
}

/// Flip an entity between enabled and disabled.
///
/// Packages are never toggled directly. Enabling a module whose owning package
/// is disabled also clears the package's `off` marker; disabling never cascades upward.
pub fn toggle(tree: &ModTree, id: ModId) -> ModResult<ToggleReport> {
    let entity = tree.get(id);
    if entity.kind == ModKind::Package {
        return Ok(ToggleReport { result: ToggleResult::NoOp, failures: Vec::new() });
    }
    if !entity.path.is_dir() {
        return Err(ModError::io(
            &entity.path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "mod folder no longer exists"),
        ));
    }

    let currently_enabled = !has_sentinel(&entity.path, SentinelKind::Off);
    let mut failures = set_folder_enabled(&entity.path, !currently_enabled);

    let result = if currently_enabled {
        ToggleResult::Disabled
    } else {
        if let Some(parent) = tree.parent(id).filter(|p| p.kind == ModKind::Package) {
            match remove_sentinel(&parent.path, SentinelKind::Off) {
                Ok(true) => info!("enabled package {} for module {}", parent.name, entity.name),
                Ok(false) => {}
                Err(e) => {
                    warn!("could not re-enable package {}: {e}", parent.path.display());
                    failures.push(RenameFailure { path: parent.path.clone(), message: e.to_string() });
                }
            }
        }
        ToggleResult::Enabled
    };
    info!("{} {} ({} failure(s))", entity.name, if result == ToggleResult::Enabled { "enabled" } else { "disabled" }, failures.len());
    Ok(ToggleReport { result, failures })
}

/// Rename payload files and place or clear `off` markers across the whole subtree.
///
/// Best-effort: each failure is logged and collected, the rest of the tree is still processed.
pub fn set_folder_enabled(folder: &Path, enabled: bool) -> Vec<RenameFailure> {
    let mut failures = Vec::new();
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in WalkDir::new(folder) {
        match entry {
            Ok(e) if e.file_type().is_dir() => dirs.push(e.into_path()),
            Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| folder.to_path_buf());
                warn!("walk {}: {e}", path.display());
                failures.push(RenameFailure { path, message: e.to_string() });
            }
        }
    }

    for file in files {
        let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else { continue };
        let new_name = if enabled {
            if !is_disabled_payload(&name) {
                continue;
            }
            name[..name.len() - DISABLED_SUFFIX.len()].to_string()
        } else {
            if !is_active_payload(&name) {
                continue;
            }
            format!("{name}{DISABLED_SUFFIX}")
        };
        let target = file.with_file_name(&new_name);
        // rename would silently replace the other copy
        if target.symlink_metadata().is_ok() {
            warn!("not renaming {}: {} already exists", file.display(), new_name);
            failures.push(RenameFailure { path: file, message: format!("target {new_name} already exists") });
            continue;
        }
        if let Err(e) = fs::rename(&file, &target) {
            warn!("rename {} -> {}: {e}", file.display(), new_name);
            failures.push(RenameFailure { path: file, message: e.to_string() });
        }
    }

    for dir in dirs {
        let outcome = if enabled {
            remove_sentinel(&dir, SentinelKind::Off).map(|_| ())
        } else {
            write_sentinel(&dir, SentinelKind::Off).map(|_| ())
        };
        if let Err(e) = outcome {
            warn!("{e}");
            failures.push(RenameFailure { path: dir, message: e.to_string() });
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        names.sort();
        names
    }

    fn id_of(tree: &ModTree, name: &str) -> ModId {
        tree.iter().find(|(_, n)| n.name == name).map(|(id, _)| id).unwrap()
    }

    #[test]
    fn payload_name_matching() {
        assert!(is_active_payload("A.PAK"));
        assert!(is_active_payload("a.utoc"));
        assert!(!is_active_payload("a.pak.off"));
        assert!(is_disabled_payload("a.UCAS.OFF"));
        assert!(!is_disabled_payload("readme.off"));
    }

    #[test]
    fn disable_then_enable_restores_names_exactly() {
        let tmp = TempDir::new().unwrap();
        let m = tmp.path().join("Mods/MyMod");
        touch(&m.join("mod"));
        touch(&m.join("001_MyMod_P.pak"));
        touch(&m.join("MyMod_P.UCAS"));
        touch(&m.join("sub/MyMod_P.utoc"));
        touch(&m.join("readme.txt"));
        let before = file_names(&m);

        let tree = scan(&tmp.path().join("Mods")).unwrap();
        let id = id_of(&tree, "MyMod");
        let report = toggle(&tree, id).unwrap();
        assert_eq!(report.result, ToggleResult::Disabled);
        assert!(report.failures.is_empty());
        assert!(m.join("001_MyMod_P.pak.off").is_file());
        assert!(m.join("MyMod_P.UCAS.off").is_file());
        assert!(m.join("sub/MyMod_P.utoc.off").is_file());
        assert!(m.join("off").is_file());
        assert!(m.join("sub/off").is_file());
        assert!(m.join("readme.txt").is_file());

        let tree = scan(&tmp.path().join("Mods")).unwrap();
        let report = toggle(&tree, id_of(&tree, "MyMod")).unwrap();
        assert_eq!(report.result, ToggleResult::Enabled);
        assert_eq!(file_names(&m), before);
    }

    #[test]
    fn disabling_twice_does_not_double_suffix() {
        let tmp = TempDir::new().unwrap();
        let m = tmp.path().join("M");
        touch(&m.join("a.pak.off"));
        touch(&m.join("b.pak"));
        assert!(set_folder_enabled(&m, false).is_empty());
        assert!(set_folder_enabled(&m, false).is_empty());
        assert_eq!(file_names(&m), vec!["a.pak.off", "b.pak.off", "off"]);
    }

    #[test]
    fn packages_are_not_toggled() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("Pkg");
        touch(&pkg.join("fomod"));
        touch(&pkg.join("Opt/module"));
        touch(&pkg.join("Opt/x.pak"));
        let before = file_names(&pkg);

        let tree = scan(tmp.path()).unwrap();
        let report = toggle(&tree, id_of(&tree, "Pkg")).unwrap();
        assert_eq!(report.result, ToggleResult::NoOp);
        assert_eq!(file_names(&pkg), before);
    }

    #[test]
    fn enabling_a_module_enables_its_package() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("Pkg");
        touch(&pkg.join("fomod"));
        touch(&pkg.join("off"));
        touch(&pkg.join("Opt/module"));
        touch(&pkg.join("Opt/off"));
        touch(&pkg.join("Opt/x.pak.off"));
        touch(&pkg.join("Other/module"));
        touch(&pkg.join("Other/off"));
        touch(&pkg.join("Other/y.pak.off"));

        let tree = scan(tmp.path()).unwrap();
        let report = toggle(&tree, id_of(&tree, "Opt")).unwrap();
        assert_eq!(report.result, ToggleResult::Enabled);
        assert!(!pkg.join("off").exists());
        assert!(pkg.join("Opt/x.pak").is_file());
        // siblings keep their own state
        assert!(pkg.join("Other/off").is_file());
        assert!(pkg.join("Other/y.pak.off").is_file());
    }

    #[test]
    fn disabling_a_module_leaves_package_alone() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("Pkg");
        touch(&pkg.join("fomod"));
        touch(&pkg.join("Opt/module"));
        touch(&pkg.join("Opt/x.pak"));

        let tree = scan(tmp.path()).unwrap();
        let report = toggle(&tree, id_of(&tree, "Opt")).unwrap();
        assert_eq!(report.result, ToggleResult::Disabled);
        assert!(!pkg.join("off").exists());
        assert!(pkg.join("Opt/off").is_file());
    }

    #[test]
    fn enabling_keeps_a_payload_reinstalled_while_disabled() {
        let tmp = TempDir::new().unwrap();
        let m = tmp.path().join("MyMod");
        touch(&m.join("mod"));
        touch(&m.join("off"));
        fs::write(m.join("x.pak.off"), b"v1").unwrap();
        fs::write(m.join("x.pak"), b"v2").unwrap();
        touch(&m.join("x.ucas.off"));

        let tree = scan(tmp.path()).unwrap();
        let report = toggle(&tree, id_of(&tree, "MyMod")).unwrap();
        assert_eq!(report.result, ToggleResult::Enabled);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, m.join("x.pak.off"));
        assert_eq!(fs::read(m.join("x.pak")).unwrap(), b"v2");
        assert_eq!(fs::read(m.join("x.pak.off")).unwrap(), b"v1");
        assert!(m.join("x.ucas").is_file());
    }

    #[test]
    fn one_blocked_rename_does_not_stop_the_rest() {
        let tmp = TempDir::new().unwrap();
        let m = tmp.path().join("M");
        touch(&m.join("a.pak"));
        touch(&m.join("a.pak.off/keep.txt"));
        touch(&m.join("b.pak"));
        touch(&m.join("sub/c.utoc"));

        let failures = set_folder_enabled(&m, false);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, m.join("a.pak"));
        assert!(m.join("a.pak").is_file());
        assert!(m.join("a.pak.off/keep.txt").is_file());
        assert!(m.join("b.pak.off").is_file());
        assert!(m.join("sub/c.utoc.off").is_file());
        assert!(m.join("off").is_file());
        assert!(m.join("sub/off").is_file());
    }

    #[test]
    fn vanished_folder_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let m = tmp.path().join("Gone");
        touch(&m.join("mod"));
        let tree = scan(tmp.path()).unwrap();
        fs::remove_dir_all(&m).unwrap();
        assert!(matches!(toggle(&tree, id_of(&tree, "Gone")), Err(ModError::Io { .. })));
    }
}
