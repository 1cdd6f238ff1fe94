use crate::error::{IoResultExt, ModResult};
use crate::paths::{category_folder, Category, InstallRoot};
use crate::sentinel::{has_sentinel, SentinelKind};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModKind {
    Mod,
    Package,
    Module,
    Unknown,
}

impl ModKind {
    /// Sentinel priority: `mod` > `package` > `module` > nothing.
    fn detect(dir: &Path) -> ModKind {
        if has_sentinel(dir, SentinelKind::Mod) {
            ModKind::Mod
        } else if has_sentinel(dir, SentinelKind::Package) {
            ModKind::Package
        } else if has_sentinel(dir, SentinelKind::Module) {
            ModKind::Module
        } else {
            ModKind::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModKind::Mod => "mod",
            ModKind::Package => "package",
            ModKind::Module => "module",
            ModKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ModKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of an entity inside its [`ModTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModId(usize);

#[derive(Debug, Clone)]
pub struct ModEntity {
    pub name: String,
    pub path: PathBuf,
    pub kind: ModKind,
    pub enabled: bool,
    pub children: Vec<ModId>,
    pub parent: Option<ModId>,
}

/// Result of one scan. Owns every entity; `parent` links are plain ids into
/// this table, so nothing survives past the next rescan.
#[derive(Debug, Clone, Default)]
pub struct ModTree {
    nodes: Vec<ModEntity>,
    roots: Vec<ModId>,
}

impl ModTree {
    pub fn roots(&self) -> &[ModId] {
        &self.roots
    }

    pub fn get(&self, id: ModId) -> &ModEntity {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: ModId) -> Option<&ModEntity> {
        self.get(id).parent.map(|p| self.get(p))
    }

    pub fn children(&self, id: ModId) -> impl Iterator<Item = (ModId, &ModEntity)> {
        self.get(id).children.iter().map(|c| (*c, self.get(*c)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModId, &ModEntity)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ModId(i), n))
    }

    pub fn find_by_path(&self, path: &Path) -> Option<ModId> {
        self.iter().find(|(_, n)| n.path == path).map(|(id, _)| id)
    }

    fn push(&mut self, dir: &Path, kind: ModKind, parent: Option<ModId>) -> ModId {
        let id = ModId(self.nodes.len());
        self.nodes.push(ModEntity {
            name: dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            path: dir.to_path_buf(),
            kind,
            enabled: !has_sentinel(dir, SentinelKind::Off),
            children: Vec::new(),
            parent,
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    fn scan_dir(&mut self, dir: &Path, parent: Option<ModId>) -> ModResult<ModId> {
        let kind = ModKind::detect(dir);
        let id = self.push(dir, kind, parent);
        match kind {
            ModKind::Mod | ModKind::Module => {}
            ModKind::Package => {
                for sub in sorted_subdirs(dir)? {
                    if has_sentinel(&sub, SentinelKind::Module) {
                        self.push(&sub, ModKind::Module, Some(id));
                    } else {
                        self.scan_dir(&sub, Some(id))?;
                    }
                }
            }
            ModKind::Unknown => {
                for sub in sorted_subdirs(dir)? {
                    self.scan_dir(&sub, Some(id))?;
                }
            }
        }
        Ok(id)
    }
}

fn sorted_subdirs(dir: &Path) -> ModResult<Vec<PathBuf>> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir).at(dir)? {
        let entry = entry.at(dir)?;
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        }
    }
    subdirs.sort_by_cached_key(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default());
    Ok(subdirs)
}

/// Scan every immediate folder of `mods_root`.
///
/// All folders are returned regardless of enabled state. Top-level entries of
/// a recognized kind come before `unknown` ones; each group and every child
/// list is ordered case-insensitively by name. A missing `mods_root` scans empty.
pub fn scan(mods_root: &Path) -> ModResult<ModTree> {
    let mut tree = ModTree::default();
    if !mods_root.is_dir() {
        debug!("{} does not exist, nothing to scan", mods_root.display());
        return Ok(tree);
    }
    let mut unknowns = Vec::new();
    for dir in sorted_subdirs(mods_root)? {
        let id = tree.scan_dir(&dir, None)?;
        if tree.get(id).kind == ModKind::Unknown {
            unknowns.push(id);
        } else {
            tree.roots.push(id);
        }
    }
    tree.roots.extend(unknowns);
    info!("scanned {} ({} entities)", mods_root.display(), tree.len());
    Ok(tree)
}

pub fn scan_installation(root: &InstallRoot) -> ModResult<ModTree> {
    scan(&category_folder(root, Category::Mods))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn folder(base: &Path, rel: &str, sentinels: &[&str]) -> PathBuf {
        let dir = base.join(rel);
        fs::create_dir_all(&dir).unwrap();
        for s in sentinels {
            fs::write(dir.join(s), b"").unwrap();
        }
        dir
    }

    fn names(tree: &ModTree, ids: &[ModId]) -> Vec<String> {
        ids.iter().map(|id| tree.get(*id).name.clone()).collect()
    }

    #[test]
    fn kind_priority_is_mod_package_module_unknown() {
        let tmp = TempDir::new().unwrap();
        folder(tmp.path(), "All", &["mod", "fomod", "module"]);
        folder(tmp.path(), "Pkg", &["fomod", "module"]);
        folder(tmp.path(), "Mdl", &["module"]);
        folder(tmp.path(), "Bare", &[]);

        let tree = scan(tmp.path()).unwrap();
        let kind = |name: &str| tree.iter().find(|(_, n)| n.name == name).unwrap().1.kind;
        assert_eq!(kind("All"), ModKind::Mod);
        assert_eq!(kind("Pkg"), ModKind::Package);
        assert_eq!(kind("Mdl"), ModKind::Module);
        assert_eq!(kind("Bare"), ModKind::Unknown);
    }

    #[test]
    fn returns_disabled_folders_too() {
        let tmp = TempDir::new().unwrap();
        folder(tmp.path(), "On", &["mod"]);
        folder(tmp.path(), "Off", &["mod", "off"]);

        let tree = scan(tmp.path()).unwrap();
        assert_eq!(tree.roots().len(), 2);
        let off = tree.iter().find(|(_, n)| n.name == "Off").unwrap().1;
        assert!(!off.enabled);
        let on = tree.iter().find(|(_, n)| n.name == "On").unwrap().1;
        assert!(on.enabled);
    }

    #[test]
    fn mod_folders_are_leaves() {
        let tmp = TempDir::new().unwrap();
        folder(tmp.path(), "Plain", &["mod"]);
        folder(tmp.path(), "Plain/Sub", &["module"]);
        let tree = scan(tmp.path()).unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn package_children_and_parent_links() {
        let tmp = TempDir::new().unwrap();
        folder(tmp.path(), "Pkg", &["fomod"]);
        folder(tmp.path(), "Pkg/optionB", &["module"]);
        folder(tmp.path(), "Pkg/OptionA", &["module", "off"]);
        folder(tmp.path(), "Pkg/OptionA/Deep", &["module"]);
        folder(tmp.path(), "Pkg/Nested", &[]);
        folder(tmp.path(), "Pkg/Nested/Inner", &["mod"]);

        let tree = scan(tmp.path()).unwrap();
        let pkg = tree.roots()[0];
        let children: Vec<ModId> = tree.get(pkg).children.clone();
        assert_eq!(names(&tree, &children), vec!["Nested", "OptionA", "optionB"]);

        let option_a = children[1];
        assert_eq!(tree.get(option_a).kind, ModKind::Module);
        assert!(tree.get(option_a).children.is_empty());
        assert!(!tree.get(option_a).enabled);
        assert_eq!(tree.parent(option_a).unwrap().kind, ModKind::Package);

        let nested = children[0];
        assert_eq!(tree.get(nested).kind, ModKind::Unknown);
        let inner = tree.get(nested).children[0];
        assert_eq!(tree.get(inner).kind, ModKind::Mod);
        assert_eq!(tree.get(inner).parent, Some(nested));
    }

    #[test]
    fn unknown_folders_recurse_fully() {
        let tmp = TempDir::new().unwrap();
        folder(tmp.path(), "Loose/a/b/c", &[]);
        folder(tmp.path(), "Loose/a/m", &["mod"]);
        let tree = scan(tmp.path()).unwrap();
        assert_eq!(tree.len(), 5);
        assert!(tree.find_by_path(&tmp.path().join("Loose/a/b/c")).is_some());
    }

    #[test]
    fn recognized_roots_come_before_unknown() {
        let tmp = TempDir::new().unwrap();
        folder(tmp.path(), "aaa", &[]);
        folder(tmp.path(), "Zed", &["mod"]);
        folder(tmp.path(), "beta", &["fomod"]);
        let tree = scan(tmp.path()).unwrap();
        assert_eq!(names(&tree, tree.roots()), vec!["beta", "Zed", "aaa"]);
    }

    #[test]
    fn missing_root_scans_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(scan(&tmp.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn files_are_not_entities() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("stray.pak"), b"").unwrap();
        folder(tmp.path(), "M", &["mod"]);
        assert_eq!(scan(tmp.path()).unwrap().len(), 1);
    }
}
