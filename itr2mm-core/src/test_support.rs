use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a zip fixture. A `None` body adds a directory entry.
pub fn write_zip(path: &Path, entries: &[(&str, Option<&str>)]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, body) in entries {
        match body {
            Some(body) => {
                zip.start_file(*name, options).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            None => zip.add_directory(name.trim_end_matches('/'), options).unwrap(),
        }
    }
    zip.finish().unwrap();
}
