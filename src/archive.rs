//! In-memory extension archive.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PublishError;

/// Relative path → file contents. Paths are unique and `/` separated.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtensionArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ExtensionArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every file below `dir`, skipping the top-level file named
    /// `exclude` (a previous archive written into the same directory).
    pub fn from_dir(dir: &Path, exclude: &str) -> Result<Self, PublishError> {
        let mut archive = ExtensionArchive::new();
        archive.add_dir(dir, "", exclude)?;
        Ok(archive)
    }

    fn add_dir(&mut self, dir: &Path, prefix: &str, exclude: &str) -> Result<(), PublishError> {
        let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = format!("{prefix}{name}");
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.add_dir(&entry.path(), &format!("{path}/"), exclude)?;
            } else if prefix.is_empty() && name == exclude {
                debug!(%path, "skipping previous archive");
            } else {
                self.insert(path, std::fs::read(entry.path())?)?;
            }
        }
        Ok(())
    }

    /// Add an entry. Paths must be unique.
    pub fn insert(&mut self, path: impl Into<String>, contents: Vec<u8>) -> Result<(), PublishError> {
        let path = path.into();
        if self.entries.contains_key(&path) {
            return Err(PublishError::DuplicateEntry(path));
        }
        self.entries.insert(path, contents);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as a deflate-compressed zip.
    pub fn to_zip(&self) -> Result<Vec<u8>, PublishError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (path, contents) in &self.entries {
            writer.start_file(path.as_str(), options)?;
            writer.write_all(contents)?;
        }
        Ok(writer.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn duplicate_paths_are_rejected() {
        let mut archive = ExtensionArchive::new();
        archive.insert("index.js", b"a".to_vec()).unwrap();

        let result = archive.insert("index.js", b"b".to_vec());

        assert!(matches!(result, Err(PublishError::DuplicateEntry(p)) if p == "index.js"));
        assert_eq!(archive.get("index.js"), Some(&b"a"[..]));
    }

    #[test]
    fn from_dir_walks_subdirectories_and_skips_previous_archive() {
        //* Given
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.js"), "console.log(1)").unwrap();
        std::fs::write(dir.path().join("dist.zip"), "old archive").unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets").join("logo.svg"), "<svg/>").unwrap();

        //* When
        let archive = ExtensionArchive::from_dir(dir.path(), "dist.zip").unwrap();

        //* Then
        assert_eq!(archive.paths().collect::<Vec<_>>(), vec!["assets/logo.svg", "index.js"]);
        assert_eq!(archive.get("index.js"), Some(&b"console.log(1)"[..]));
    }

    #[test]
    fn zip_contains_every_entry() {
        //* Given
        let mut archive = ExtensionArchive::new();
        archive.insert("a.js", b"alert(1)".to_vec()).unwrap();
        archive.insert("b.html", b"<p>hi</p>".to_vec()).unwrap();

        //* When
        let bytes = archive.to_zip().unwrap();

        //* Then
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 2);
        let mut contents = String::new();
        zip.by_name("b.html").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "<p>hi</p>");
    }
}
