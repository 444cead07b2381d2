// Audio playback module
// Symphonia decodes, cpal plays, and the controller runs the frame loop between them

pub mod clock;
pub mod decoder;
pub mod output;
pub mod player;
pub mod source;

#[cfg(test)]
pub(crate) mod fake;

pub use player::{PlaybackController, PlaybackSnapshot, PlaybackState};
pub use source::{DecoderFrameSource, FrameSource, Session};
