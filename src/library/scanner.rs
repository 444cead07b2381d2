use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{PlayerError, Result};

/// List of supported audio file extensions
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "mp2", "mp1", "flac", "ogg", "wav", "m4a", "aac",
];

/// Scanner for finding audio files in a directory tree
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Scan a directory recursively and return all audio file paths, sorted
    pub fn scan<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(PlayerError::NotFound(directory.display().to_string()));
        }

        let mut audio_files = Vec::new();

        for entry in WalkDir::new(directory)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            if Self::is_supported(path) {
                audio_files.push(path.to_path_buf());
            }
        }

        audio_files.sort();
        Ok(audio_files)
    }

    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("disc2")).unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("a.MP3"), b"").unwrap();
        std::fs::write(dir.path().join("cover.jpg"), b"").unwrap();
        std::fs::write(dir.path().join("disc2").join("c.flac"), b"").unwrap();

        let found = DirectoryScanner::scan(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.MP3", "b.mp3", "disc2/c.flac"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = DirectoryScanner::scan(dir.path().join("nope"));
        assert!(matches!(result, Err(PlayerError::NotFound(_))));
    }
}
