use crate::error::{IoResultExt, ModError, ModResult};
use fs_extra::dir::{copy_with_progress, CopyOptions, TransitProcess, TransitProcessResult};
use std::fs;
use std::path::Path;
use tracing::debug;

fn copy_options() -> CopyOptions {
    let mut opts = CopyOptions::new();
    opts.content_only = true;
    opts.copy_inside = true;
    opts.overwrite = true;
    opts
}

/// Copy everything inside `src` into `dst` (created if missing), overwriting
/// files that already exist. `on_progress` receives copied and total bytes.
pub fn copy_dir_contents<F: FnMut(u64, u64)>(src: &Path, dst: &Path, mut on_progress: F) -> ModResult<u64> {
    fs::create_dir_all(dst).at(dst)?;
    let handler = |tp: TransitProcess| {
        on_progress(tp.copied_bytes, tp.total_bytes);
        TransitProcessResult::ContinueOrAbort
    };
    let n = copy_with_progress(src, dst, &copy_options(), handler).map_err(|e| {
        ModError::io(dst, std::io::Error::new(std::io::ErrorKind::Other, format!("copy from {}: {e}", src.display())))
    })?;
    debug!("copied {} bytes {} -> {}", n, src.display(), dst.display());
    Ok(n)
}

/// Replace `dst` with a copy of `src`: any existing `dst` is removed first so
/// nothing from a previous install survives.
pub fn replace_dir<F: FnMut(u64, u64)>(src: &Path, dst: &Path, on_progress: F) -> ModResult<u64> {
    if dst.exists() {
        fs::remove_dir_all(dst).at(dst)?;
    }
    copy_dir_contents(src, dst, on_progress)
}
