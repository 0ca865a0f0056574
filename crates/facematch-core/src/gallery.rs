//! Reference image gallery: a flat directory where each file is one identity.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("failed to read reference directory {dir}: {source}")]
    Unreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One identity in the reference directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// File name as listed, reported verbatim as the identity label.
    pub label: String,
    pub path: PathBuf,
}

/// A directory of known-identity images.
///
/// The gallery holds no state beyond the path: membership may change between
/// requests, so every listing re-reads the directory.
#[derive(Debug, Clone)]
pub struct Gallery {
    dir: PathBuf,
}

impl Gallery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List the directory in lexicographic file-name order.
    ///
    /// Listing order decides scan ties downstream, so it must be stable across
    /// platforms; raw `read_dir` order is not. Entries that are not decodable
    /// images are still listed and fail later, during verification.
    pub fn entries(&self) -> Result<Vec<ReferenceEntry>, GalleryError> {
        let read = fs::read_dir(&self.dir).map_err(|source| GalleryError::Unreadable {
            dir: self.dir.clone(),
            source,
        })?;

        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(|source| GalleryError::Unreadable {
                dir: self.dir.clone(),
                source,
            })?;
            let label = entry.file_name().to_string_lossy().into_owned();
            entries.push(ReferenceEntry { label, path: entry.path() });
        }

        entries.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_sorted_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["carol.png", "alice.jpg", "bob.jpg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let gallery = Gallery::new(dir.path());
        let entries = gallery.entries().unwrap();

        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["alice.jpg", "bob.jpg", "carol.png"]);
        assert_eq!(entries[0].path, dir.path().join("alice.jpg"));
    }

    #[test]
    fn test_entries_reflect_directory_changes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();

        let gallery = Gallery::new(dir.path());
        assert_eq!(gallery.entries().unwrap().len(), 1);

        // A file added after construction shows up in the next listing
        fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        assert_eq!(gallery.entries().unwrap().len(), 2);

        fs::remove_file(dir.path().join("a.jpg")).unwrap();
        let labels: Vec<String> = gallery.entries().unwrap().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, ["b.jpg"]);
    }

    #[test]
    fn test_empty_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = Gallery::new(dir.path());
        assert!(gallery.entries().unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let gallery = Gallery::new("/nonexistent/facematch-gallery");
        let err = gallery.entries().unwrap_err();
        assert!(matches!(err, GalleryError::Unreadable { .. }));
    }

    #[test]
    fn test_non_image_files_are_listed() {
        // The gallery does not filter by extension; undecodable entries are
        // skipped later when verification fails on them.
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

        let gallery = Gallery::new(dir.path());
        let entries = gallery.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "notes.txt");
    }
}
