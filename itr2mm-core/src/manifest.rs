use crate::error::{ModError, ModResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const MANIFEST_FOLDER: &str = "fomod";
pub const INFO_FILE: &str = "info.xml";
pub const MODULE_CONFIG_FILE: &str = "ModuleConfig.xml";
const UNNAMED_PLUGIN: &str = "Unnamed Plugin";
const DEFAULT_STEP_NAME: &str = "InstallStep";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    /// Folder relative to the package root.
    pub source: String,
    /// Folder relative to the installation root.
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    pub title: String,
    pub description: String,
    pub image_relative_path: Option<String>,
    pub files: Vec<FileGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStep {
    pub name: String,
    pub plugins: Vec<Plugin>,
}

impl InstallStep {
    pub fn plugin(&self, title: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.title == title)
    }
}

/// Manifest files located inside an extracted package.
#[derive(Debug, Clone)]
pub struct ManifestFolder {
    pub dir: PathBuf,
    pub info: Option<PathBuf>,
    pub module_config: Option<PathBuf>,
}

impl ManifestFolder {
    /// Folder that file-group sources are relative to (the parent of `fomod/`).
    pub fn package_root(&self) -> &Path {
        self.dir.parent().unwrap_or(&self.dir)
    }
}

/// First folder named `fomod` (any case) under `root`, walking in name order.
pub fn locate_manifest_folder(root: &Path) -> ModResult<ManifestFolder> {
    let dir = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(MANIFEST_FOLDER))
        .map(|e| e.into_path())
        .ok_or_else(|| ModError::archive(root, "no fomod folder found in the package"))?;

    let mut folder = ManifestFolder { dir: dir.clone(), info: None, module_config: None };
    for entry in fs::read_dir(&dir).map_err(|e| ModError::io(&dir, e))?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.eq_ignore_ascii_case(INFO_FILE) {
            folder.info = Some(entry.path());
        } else if name.eq_ignore_ascii_case(MODULE_CONFIG_FILE) {
            folder.module_config = Some(entry.path());
        }
    }
    debug!("manifest folder {}", dir.display());
    Ok(folder)
}

/// Decode manifest bytes; UTF-8 and UTF-16 (with BOM) are both common.
fn decode(bytes: &[u8]) -> String {
    let (text, _, _) = encoding_rs::UTF_8.decode(bytes);
    text.into_owned()
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key {
            if let Ok(value) = attr.unescape_value() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Parse `info.xml` into a title and description. Missing fields are empty.
pub fn parse_info(bytes: &[u8]) -> ModResult<PackageInfo> {
    let text = decode(bytes);
    let mut reader = Reader::from_str(&text);
    reader.trim_text(true);
    let mut info = PackageInfo::default();
    let mut stack: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase()),
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let value = t.unescape().map_err(|e| ModError::manifest(format!("info.xml: {e}")))?.trim().to_string();
                // only direct children of the root element
                if stack.len() == 2 {
                    match stack[1].as_str() {
                        "name" | "title" if info.title.is_empty() => info.title = value,
                        "description" if info.description.is_empty() => info.description = value,
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ModError::manifest(format!("info.xml: {e}"))),
        }
    }
    Ok(info)
}

/// Parse `info.xml` from disk, falling back to an empty title on any failure.
pub fn read_info_lenient(path: Option<&Path>) -> PackageInfo {
    let Some(path) = path else { return PackageInfo::default() };
    match fs::read(path).map_err(|e| ModError::io(path, e)).and_then(|b| parse_info(&b)) {
        Ok(info) => info,
        Err(e) => {
            warn!("could not read package info, continuing without a title: {e}");
            PackageInfo::default()
        }
    }
}

#[derive(Default)]
struct PluginBuilder {
    title: String,
    description: String,
    image: Option<String>,
    files: Vec<FileGroup>,
}

impl PluginBuilder {
    fn start(e: &BytesStart<'_>) -> Self {
        Self { title: attr_value(e, b"name").unwrap_or_else(|| UNNAMED_PLUGIN.to_string()), ..Default::default() }
    }

    fn finish(self) -> Plugin {
        Plugin { title: self.title, description: self.description, image_relative_path: self.image, files: self.files }
    }
}

/// Parse `ModuleConfig.xml` into install steps.
///
/// Every plugin of every group inside a step is pooled into that step's list.
/// Steps with no plugins are dropped; no steps at all is an error.
pub fn parse_module_config(bytes: &[u8]) -> ModResult<Vec<InstallStep>> {
    let text = decode(bytes);
    let mut reader = Reader::from_str(&text);
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut steps = Vec::new();
    let mut step: Option<InstallStep> = None;
    let mut plugin: Option<PluginBuilder> = None;

    let in_plugin_files = |stack: &[String]| stack.len() >= 2 && stack[stack.len() - 1] == "files" && stack[stack.len() - 2] == "plugin";
    let in_plugin_description =
        |stack: &[String]| stack.len() >= 2 && stack[stack.len() - 1] == "description" && stack[stack.len() - 2] == "plugin";

    loop {
        let event = reader.read_event().map_err(|e| ModError::manifest(format!("ModuleConfig.xml: {e}")))?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "installStep" if stack.last().map(String::as_str) == Some("installSteps") => {
                        step = Some(InstallStep {
                            name: attr_value(&e, b"name").unwrap_or_else(|| DEFAULT_STEP_NAME.to_string()),
                            plugins: Vec::new(),
                        });
                    }
                    "plugin" if step.is_some() => plugin = Some(PluginBuilder::start(&e)),
                    "image" if stack.last().map(String::as_str) == Some("plugin") => {
                        if let Some(p) = plugin.as_mut() {
                            p.image = attr_value(&e, b"path").filter(|s| !s.is_empty());
                        }
                    }
                    "folder" if in_plugin_files(&stack[..]) => {
                        if let Some(p) = plugin.as_mut() {
                            p.files.push(folder_group(&e));
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"image" if stack.last().map(String::as_str) == Some("plugin") => {
                        if let Some(p) = plugin.as_mut() {
                            p.image = attr_value(&e, b"path").filter(|s| !s.is_empty());
                        }
                    }
                    b"folder" if in_plugin_files(&stack[..]) => {
                        if let Some(p) = plugin.as_mut() {
                            p.files.push(folder_group(&e));
                        }
                    }
                    b"plugin" if step.is_some() => {
                        if let Some(s) = step.as_mut() {
                            s.plugins.push(PluginBuilder::start(&e).finish());
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                if in_plugin_description(&stack[..]) {
                    if let Some(p) = plugin.as_mut() {
                        let text = t.unescape().map_err(|e| ModError::manifest(format!("ModuleConfig.xml: {e}")))?;
                        p.description.push_str(text.trim());
                    }
                }
            }
            Event::CData(t) => {
                if in_plugin_description(&stack[..]) {
                    if let Some(p) = plugin.as_mut() {
                        p.description.push_str(String::from_utf8_lossy(&t.into_inner()).trim());
                    }
                }
            }
            Event::End(_) => {
                match stack.pop().as_deref() {
                    Some("plugin") => {
                        if let (Some(s), Some(p)) = (step.as_mut(), plugin.take()) {
                            s.plugins.push(p.finish());
                        }
                    }
                    Some("installStep") => {
                        if let Some(s) = step.take() {
                            if s.plugins.is_empty() {
                                debug!("skipping step {:?} with no plugins", s.name);
                            } else {
                                steps.push(s);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if steps.is_empty() {
        return Err(ModError::manifest("ModuleConfig.xml declares no install steps with selectable plugins"));
    }
    Ok(steps)
}

fn folder_group(e: &BytesStart<'_>) -> FileGroup {
    FileGroup {
        source: attr_value(e, b"source").unwrap_or_default(),
        destination: attr_value(e, b"destination").unwrap_or_default(),
    }
}

/// Read and parse the step descriptor of a located manifest folder.
pub fn read_module_config(folder: &ManifestFolder) -> ModResult<Vec<InstallStep>> {
    let path = folder
        .module_config
        .as_ref()
        .ok_or_else(|| ModError::manifest_at(&folder.dir, "ModuleConfig.xml not found in the fomod folder"))?;
    let bytes = fs::read(path).map_err(|e| ModError::io(path, e))?;
    parse_module_config(&bytes).map_err(|e| match e {
        ModError::Manifest { message, .. } => ModError::manifest_at(path, message),
        other => other,
    })
}
