// Tag reading for track display info

pub mod extractor;

pub use extractor::{MetadataExtractor, TrackTags};
