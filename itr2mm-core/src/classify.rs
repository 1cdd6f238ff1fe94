use crate::paths::Category;

/// Where one archive file goes: its category plus the path relative to that category's folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub category: Category,
    pub relative_path: String,
}

/// Classify a normalized, `/`-separated archive entry path.
///
/// Rules, first match wins:
/// 1. `Top/<Category>/rest..` strips the embedded category folder -> `Top/rest..`.
/// 2. `<Category>/rest..` keeps the full path under that category.
/// 3. Anything else lands in `Mods` unchanged.
///
/// Directory entries (trailing `/`) and empty paths yield `None`.
pub fn classify_entry(path: &str) -> Option<Classified> {
    if path.is_empty() || path.ends_with('/') {
        return None;
    }
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }

    if segments.len() >= 2 {
        if let Some(category) = Category::from_folder_name(segments[1]) {
            let mut kept = vec![segments[0]];
            kept.extend_from_slice(&segments[2..]);
            return Some(Classified { category, relative_path: kept.join("/") });
        }
    }

    let category = Category::from_folder_name(segments[0]).unwrap_or(Category::Mods);
    Some(Classified { category, relative_path: segments.join("/") })
}
