// Error types shared by the playback engine
use thiserror::Error;

/// Errors surfaced by sessions, the controller and the settings store.
///
/// Everything except `Settings` and `Io` is track-scoped: it ends the affected
/// session, the controller drops back to `Stopped` and the UI is told.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("track source not found: {0}")]
    NotFound(String),

    #[error("unsupported audio format: {0}")]
    Unsupported(String),

    #[error("corrupt audio stream: {0}")]
    Corrupt(String),

    #[error("audio output unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    /// True for failures that only end the current session.
    pub fn is_track_scoped(&self) -> bool {
        matches!(
            self,
            PlayerError::NotFound(_)
                | PlayerError::Unsupported(_)
                | PlayerError::Corrupt(_)
                | PlayerError::DeviceUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_scoped_classification() {
        assert!(PlayerError::NotFound("a.mp3".into()).is_track_scoped());
        assert!(PlayerError::DeviceUnavailable("no device".into()).is_track_scoped());
        assert!(!PlayerError::Settings("bad json".into()).is_track_scoped());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = PlayerError::Corrupt("frame 12".into());
        assert_eq!(err.to_string(), "corrupt audio stream: frame 12");
    }
}
