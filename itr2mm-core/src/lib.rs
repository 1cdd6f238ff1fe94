pub mod error;
pub mod paths;
pub mod archive;
pub mod classify;
pub mod install;
pub mod manifest;
pub mod package;
pub mod sentinel;
pub mod scanner;
pub mod state;
pub mod load_order;
pub mod library;
pub mod fs_util;
pub mod settings;
pub mod logging;

#[cfg(test)]
mod test_support;

pub use error::{IoResultExt, ModError, ModResult};
pub use paths::{category_folder, check_game_folder, ensure_category_folders, paks_root, Category, GameFolderCheck, InstallRoot};
pub use archive::{ArchiveEntry, ArchiveReader};
pub use classify::{classify_entry, Classified};
pub use install::{install_archive, InstallReport};
pub use manifest::{locate_manifest_folder, parse_info, parse_module_config, FileGroup, InstallStep, ManifestFolder, PackageInfo, Plugin};
pub use package::{install_selected, PackageReport, PackageSession, PackageStage, Selection};
pub use sentinel::{has_sentinel, remove_sentinel, write_sentinel, SentinelKind};
pub use scanner::{scan, scan_installation, ModEntity, ModId, ModKind, ModTree};
pub use state::{set_folder_enabled, toggle, RenameFailure, ToggleReport, ToggleResult};
pub use load_order::{get_default_order, orderable_folders, set_order, LoadOrder};
pub use library::{clear_temp_folder, delete_mod_folder, list_category, CategoryFolder};
pub use fs_util::{copy_dir_contents, replace_dir};
pub use settings::{AppSettings, SettingsStore};
pub use logging::{init_logging, init_logging_in, ProgressThrottle};
