// framedeck - MPEG audio player engine
// Module declarations
pub mod audio;
pub mod commands;
pub mod error;
pub mod library;
pub mod metadata;
pub mod queue;
pub mod settings;
pub mod state;
pub mod ui;

pub use audio::{PlaybackController, PlaybackSnapshot, PlaybackState};
pub use commands::{CommandHandler, UiCommand};
pub use error::{PlayerError, Result};
pub use state::AppState;
