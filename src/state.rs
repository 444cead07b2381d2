// Application state management
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::source::{DecoderFrameSource, FrameSource};
use crate::audio::PlaybackController;
use crate::queue::Playlist;
use crate::settings::PlayerSettings;
use crate::ui::UiHandle;

/// Everything the command handlers share.
pub struct AppState {
    pub player: Arc<PlaybackController>,
    pub playlist: Arc<Mutex<Playlist>>,
    pub ui: UiHandle,
    pub settings: PlayerSettings,
    pub app_dir: PathBuf,
}

impl AppState {
    /// State backed by the real decoder and the default output device.
    pub fn new(settings: PlayerSettings, ui: UiHandle, app_dir: PathBuf) -> Self {
        let source = DecoderFrameSource::new(settings.output.options());
        Self::with_source(Arc::new(source), settings, ui, app_dir)
    }

    pub fn with_source(
        source: Arc<dyn FrameSource>,
        settings: PlayerSettings,
        ui: UiHandle,
        app_dir: PathBuf,
    ) -> Self {
        let playlist = Arc::new(Mutex::new(Playlist::new()));
        let player = Arc::new(PlaybackController::new(
            source,
            Arc::clone(&playlist),
            ui.clone(),
            settings.playback.clone(),
        ));
        Self {
            player,
            playlist,
            ui,
            settings,
            app_dir,
        }
    }
}
