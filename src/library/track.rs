// Track model
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::audio::clock;
use crate::audio::decoder::AudioDecoder;
use crate::error::{PlayerError, Result};
use crate::metadata::extractor::MetadataExtractor;

/// A loaded audio file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub file_path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub frame_count: u64,
    pub ms_per_frame: f64,
    pub duration_ms: f64,
}

impl Track {
    /// Build a track from already known metadata and frame geometry.
    pub fn new(
        file_path: impl Into<PathBuf>,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        frame_count: u64,
        ms_per_frame: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_path: file_path.into(),
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            frame_count,
            ms_per_frame,
            duration_ms: clock::elapsed_ms(frame_count, ms_per_frame),
        }
    }

    /// Read tags and probe frame geometry from an audio file.
    pub fn load(path: &Path) -> Result<Self> {
        let info = AudioDecoder::probe(path)?;
        let tags = MetadataExtractor::extract_from_file(path);

        log::debug!(
            "[Library] {}: {} frames of {:.2} ms",
            path.display(),
            info.frame_count,
            info.ms_per_frame
        );

        let mut track = Self::new(
            path,
            tags.title,
            tags.artist.unwrap_or_default(),
            tags.album.unwrap_or_default(),
            info.frame_count,
            info.ms_per_frame,
        );
        track.duration_ms = info.duration_ms;
        Ok(track)
    }

    /// Open a fresh byte stream positioned at the start of the file.
    pub fn open_stream(&self) -> Result<File> {
        File::open(&self.file_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PlayerError::NotFound(self.file_path.display().to_string())
            }
            _ => PlayerError::Io(e),
        })
    }
}
