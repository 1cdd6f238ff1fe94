use crate::error::{IoResultExt, ModError, ModResult};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Payload folder a file is installed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Mods,
    LogicMods,
    LuaMods,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Mods, Category::LogicMods, Category::LuaMods];

    pub fn folder_name(self) -> &'static str {
        match self {
            Category::Mods => "Mods",
            Category::LogicMods => "LogicMods",
            Category::LuaMods => "LuaMods",
        }
    }

    /// Case-insensitive lookup of a folder name.
    pub fn from_folder_name(name: &str) -> Option<Category> {
        Self::ALL.into_iter().find(|c| c.folder_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Configured game installation directory. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRoot(PathBuf);

impl InstallRoot {
    pub fn new(path: impl Into<PathBuf>) -> ModResult<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
            return Err(ModError::config("installation root is not set"));
        }
        Ok(Self(path))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for InstallRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// `<root>/IntoTheRadius2/Content/Paks`, the repository root all categories live under.
pub fn paks_root(root: &InstallRoot) -> PathBuf {
    root.path().join("IntoTheRadius2").join("Content").join("Paks")
}

pub fn category_folder(root: &InstallRoot, category: Category) -> PathBuf {
    paks_root(root).join(category.folder_name())
}

pub fn ensure_category_folders(root: &InstallRoot) -> ModResult<()> {
    for category in Category::ALL {
        let dir = category_folder(root, category);
        fs::create_dir_all(&dir).at(&dir)?;
        debug!("ensured {}", dir.display());
    }
    Ok(())
}

/// Result of probing a candidate installation root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameFolderCheck {
    pub engine_dir: bool,
    pub game_dir: bool,
    pub executable: bool,
}

impl GameFolderCheck {
    pub fn is_valid(&self) -> bool {
        self.engine_dir && self.game_dir && self.executable
    }
}

pub fn check_game_folder(path: &Path) -> ModResult<GameFolderCheck> {
    let root = InstallRoot::new(path)?;
    let base = root.path();
    Ok(GameFolderCheck {
        engine_dir: base.join("Engine").is_dir(),
        game_dir: base.join("IntoTheRadius2").is_dir(),
        executable: base.join("IntoTheRadius2.exe").is_file(),
    })
}
