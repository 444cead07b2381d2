// Settings module
// Loads and saves settings.json in the app directory

#[allow(clippy::module_inception)]
pub mod settings;

pub use settings::{InterfaceSettings, OutputSettings, PlaybackSettings, PlayerSettings};
