// Metadata extractor using lofty with id3 fallback for problematic MP3 files
use lofty::error::Result as LoftyResult;
use lofty::probe::Probe;
use lofty::prelude::{Accessor, TaggedFileExt};
use id3::TagLike;
use std::path::Path;

/// Display tags for a track. Title always has a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
}

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Read title/artist/album. Falls back to id3, then to the file name.
    pub fn extract_from_file(file_path: &Path) -> TrackTags {
        let read = || -> LoftyResult<_> { Probe::open(file_path)?.guess_file_type()?.read() };

        let tagged_file = match read() {
            Ok(f) => f,
            Err(e) => {
                log::warn!("[Metadata] lofty could not read {:?}: {}", file_path, e);
                return Self::extract_with_fallback(file_path);
            }
        };

        let Some(tag) = tagged_file.primary_tag().or(tagged_file.first_tag()) else {
            return Self::extract_with_fallback(file_path);
        };

        TrackTags {
            title: tag
                .title()
                .map(|s| s.to_string())
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| Self::title_from_file_name(file_path)),
            artist: tag.artist().map(|s| s.to_string()),
            album: tag.album().map(|s| s.to_string()),
        }
    }

    fn extract_with_fallback(file_path: &Path) -> TrackTags {
        let is_mp3 = file_path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));

        if is_mp3 {
            match id3::Tag::read_from_path(file_path) {
                Ok(tag) => {
                    log::debug!("[Metadata] Using id3 fallback for {:?}", file_path);
                    return TrackTags {
                        title: tag
                            .title()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| Self::title_from_file_name(file_path)),
                        artist: tag.artist().map(|s| s.to_string()),
                        album: tag.album().map(|s| s.to_string()),
                    };
                }
                Err(e) => log::debug!("[Metadata] No id3 tag in {:?}: {}", file_path, e),
            }
        }

        TrackTags {
            title: Self::title_from_file_name(file_path),
            artist: None,
            album: None,
        }
    }

    fn title_from_file_name(file_path: &Path) -> String {
        file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Some Song.mp3");
        std::fs::write(&path, b"not really audio").unwrap();

        let tags = MetadataExtractor::extract_from_file(&path);
        assert_eq!(tags.title, "Some Song");
        assert_eq!(tags.artist, None);
        assert_eq!(tags.album, None);
    }
}
