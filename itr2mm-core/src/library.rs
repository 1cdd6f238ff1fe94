use crate::error::{IoResultExt, ModError, ModResult};
use crate::paths::{category_folder, Category, InstallRoot};
use crate::sentinel::{has_sentinel, SentinelKind};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// One folder inside a category, as listed for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFolder {
    pub name: String,
    pub path: PathBuf,
    pub enabled: bool,
    pub has_children: bool,
}

fn subfolders(dir: &Path) -> ModResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).at(dir)? {
        let entry = entry.at(dir)?;
        if entry.file_type().at(entry.path())?.is_dir() {
            out.push(entry.path());
        }
    }
    out.sort_by_cached_key(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default());
    Ok(out)
}

/// Immediate folders of `dir`, case-insensitively ordered. A missing `dir` lists empty.
pub fn list_folders(dir: &Path) -> ModResult<Vec<CategoryFolder>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    subfolders(dir)?
        .into_iter()
        .map(|path| -> ModResult<CategoryFolder> {
            let has_children = !subfolders(&path)?.is_empty();
            Ok(CategoryFolder {
                name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
                enabled: !has_sentinel(&path, SentinelKind::Off),
                has_children,
                path,
            })
        })
        .collect()
}

pub fn list_category(root: &InstallRoot, category: Category) -> ModResult<Vec<CategoryFolder>> {
    list_folders(&category_folder(root, category))
}

/// Recursively delete a mod folder.
///
/// Only folders strictly inside one of the category folders of `root` may be
/// deleted; anything else is refused as a configuration error.
pub fn delete_mod_folder(root: &InstallRoot, folder: &Path) -> ModResult<()> {
    if folder.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ModError::config(format!("refusing to delete {}: path is not normalized", folder.display())));
    }
    let inside = Category::ALL.iter().any(|c| {
        let base = category_folder(root, *c);
        folder.strip_prefix(&base).map(|rel| rel.components().next().is_some()).unwrap_or(false)
    });
    if !inside {
        return Err(ModError::config(format!(
            "refusing to delete {}: not inside a mod category folder",
            folder.display()
        )));
    }
    fs::remove_dir_all(folder).at(folder)?;
    info!("deleted {}", folder.display());
    Ok(())
}

/// Empty the temporary folder, keeping the folder itself. Returns how many entries were removed.
///
/// Best-effort: entries that cannot be removed are logged and skipped.
pub fn clear_temp_folder(temp_folder: &Path) -> ModResult<usize> {
    if temp_folder.as_os_str().is_empty() {
        return Err(ModError::config("temporary folder is not set"));
    }
    if !temp_folder.exists() {
        return Ok(0);
    }
    let mut removed = 0usize;
    for entry in fs::read_dir(temp_folder).at(temp_folder)? {
        let entry = entry.at(temp_folder)?;
        let path = entry.path();
        let outcome = if entry.file_type().at(&path)?.is_dir() { fs::remove_dir_all(&path) } else { fs::remove_file(&path) };
        match outcome {
            Ok(()) => removed += 1,
            Err(e) => warn!("could not remove {}: {e}", path.display()),
        }
    }
    debug!("cleared {} entries from {}", removed, temp_folder.display());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::ensure_category_folders;
    use tempfile::TempDir;

    fn setup() -> (TempDir, InstallRoot) {
        let tmp = TempDir::new().unwrap();
        let root = InstallRoot::new(tmp.path().join("game")).unwrap();
        ensure_category_folders(&root).unwrap();
        (tmp, root)
    }

    #[test]
    fn lists_folders_with_state() {
        let (_tmp, root) = setup();
        let logic = category_folder(&root, Category::LogicMods);
        fs::create_dir_all(logic.join("beta/inner")).unwrap();
        fs::create_dir_all(logic.join("Alpha")).unwrap();
        fs::write(logic.join("Alpha/off"), b"").unwrap();
        fs::write(logic.join("stray.pak"), b"").unwrap();

        let listed = list_category(&root, Category::LogicMods).unwrap();
        assert_eq!(
            listed,
            vec![
                CategoryFolder { name: "Alpha".into(), path: logic.join("Alpha"), enabled: false, has_children: false },
                CategoryFolder { name: "beta".into(), path: logic.join("beta"), enabled: true, has_children: true },
            ]
        );
    }

    #[test]
    fn missing_category_lists_empty() {
        let tmp = TempDir::new().unwrap();
        let root = InstallRoot::new(tmp.path().join("nothing")).unwrap();
        assert!(list_category(&root, Category::LuaMods).unwrap().is_empty());
    }

    #[test]
    fn deletes_only_inside_categories() {
        let (tmp, root) = setup();
        let lua = category_folder(&root, Category::LuaMods);
        fs::create_dir_all(lua.join("Script/sub")).unwrap();
        delete_mod_folder(&root, &lua.join("Script")).unwrap();
        assert!(!lua.join("Script").exists());

        assert!(delete_mod_folder(&root, &lua).unwrap_err().is_configuration());
        assert!(delete_mod_folder(&root, tmp.path()).unwrap_err().is_configuration());
        assert!(delete_mod_folder(&root, &lua.join("../../..")).unwrap_err().is_configuration());
        assert!(lua.is_dir());
    }

    #[test]
    fn clearing_temp_keeps_the_folder() {
        let tmp = TempDir::new().unwrap();
        let temp = tmp.path().join("temp");
        fs::create_dir_all(temp.join("package-abc/fomod")).unwrap();
        fs::write(temp.join("leftover.zip"), b"").unwrap();
        assert_eq!(clear_temp_folder(&temp).unwrap(), 2);
        assert!(temp.is_dir());
        assert_eq!(fs::read_dir(&temp).unwrap().count(), 0);
        assert_eq!(clear_temp_folder(&tmp.path().join("absent")).unwrap(), 0);
    }
}
