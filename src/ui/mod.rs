// UI notification plumbing
// The engine only ever posts events; the view runs on its own dispatch thread.

mod console;

pub use console::ConsoleView;

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::queue::{DisplayRow, Playlist};

/// Which transport buttons are clickable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportButtons {
    pub next: bool,
    pub previous: bool,
    pub play_pause: bool,
    pub stop: bool,
}

impl TransportButtons {
    /// Buttons for an active session on `playlist`.
    pub fn for_playlist(playlist: &Playlist) -> Self {
        Self {
            next: playlist.has_next(),
            previous: playlist.has_previous(),
            play_pause: true,
            stop: true,
        }
    }

    /// Buttons for a session on entry `index`, whether or not it is current yet.
    pub fn at(playlist: &Playlist, index: usize) -> Self {
        Self {
            next: index + 1 < playlist.len(),
            previous: index > 0,
            play_pause: true,
            stop: true,
        }
    }
}

/// A display update posted by the engine or the command handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    NowPlaying {
        title: String,
        artist: String,
        album: String,
    },
    Progress {
        current_ms: u64,
        total_ms: u64,
    },
    Transport(TransportButtons),
    PlayPauseIcon {
        playing: bool,
    },
    ScrubberEnabled(bool),
    /// Clear the mini player and disable playback controls.
    ResetTransport,
    Queue(Vec<DisplayRow>),
    Error(String),
}

/// The window side of the player.
///
/// Implementations are driven from a single thread and may hold non-thread-safe UI state.
pub trait PlayerView {
    fn set_now_playing(&mut self, title: &str, artist: &str, album: &str);
    fn set_progress(&mut self, current_ms: u64, total_ms: u64);
    fn set_transport_enabled(&mut self, buttons: TransportButtons);
    fn set_play_pause_icon(&mut self, playing: bool);
    fn set_scrubber_enabled(&mut self, enabled: bool);
    fn reset_transport(&mut self);
    fn set_queue(&mut self, rows: &[DisplayRow]);
    fn show_error(&mut self, message: &str);

    fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::NowPlaying { title, artist, album } => {
                self.set_now_playing(&title, &artist, &album)
            }
            UiEvent::Progress { current_ms, total_ms } => self.set_progress(current_ms, total_ms),
            UiEvent::Transport(buttons) => self.set_transport_enabled(buttons),
            UiEvent::PlayPauseIcon { playing } => self.set_play_pause_icon(playing),
            UiEvent::ScrubberEnabled(enabled) => self.set_scrubber_enabled(enabled),
            UiEvent::ResetTransport => self.reset_transport(),
            UiEvent::Queue(rows) => self.set_queue(&rows),
            UiEvent::Error(message) => self.show_error(&message),
        }
    }
}

/// Cheap, cloneable sender side of the UI event queue. Posting never blocks.
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: Sender<UiEvent>,
}

impl UiHandle {
    /// A handle whose events are collected by the caller instead of a view thread.
    pub fn channel() -> (Self, Receiver<UiEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    pub fn post(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("[UI] View is gone, dropping event");
        }
    }
}

/// Owns the thread that applies events to a `PlayerView`.
pub struct UiDispatcher {
    thread: JoinHandle<()>,
}

impl UiDispatcher {
    /// Start the dispatch thread. It runs until every `UiHandle` has been dropped.
    pub fn spawn<V>(mut view: V) -> std::io::Result<(UiHandle, Self)>
    where
        V: PlayerView + Send + 'static,
    {
        let (handle, rx) = UiHandle::channel();
        let thread = thread::Builder::new()
            .name("ui-dispatch".into())
            .spawn(move || {
                for event in rx {
                    view.apply(event);
                }
            })?;
        Ok((handle, Self { thread }))
    }

    /// Wait for the queue to drain after the last handle is dropped.
    pub fn join(self) {
        if self.thread.join().is_err() {
            log::error!("[UI] Dispatch thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingView {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl PlayerView for RecordingView {
        fn set_now_playing(&mut self, title: &str, _artist: &str, _album: &str) {
            self.calls.lock().push(format!("now:{title}"));
        }
        fn set_progress(&mut self, current_ms: u64, total_ms: u64) {
            self.calls.lock().push(format!("progress:{current_ms}/{total_ms}"));
        }
        fn set_transport_enabled(&mut self, buttons: TransportButtons) {
            self.calls.lock().push(format!("transport:{}", buttons.stop));
        }
        fn set_play_pause_icon(&mut self, playing: bool) {
            self.calls.lock().push(format!("icon:{playing}"));
        }
        fn set_scrubber_enabled(&mut self, enabled: bool) {
            self.calls.lock().push(format!("scrubber:{enabled}"));
        }
        fn reset_transport(&mut self) {
            self.calls.lock().push("reset".into());
        }
        fn set_queue(&mut self, rows: &[DisplayRow]) {
            self.calls.lock().push(format!("queue:{}", rows.len()));
        }
        fn show_error(&mut self, message: &str) {
            self.calls.lock().push(format!("error:{message}"));
        }
    }

    #[test]
    fn test_dispatcher_applies_in_order_on_its_own_thread() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let view = RecordingView { calls: calls.clone() };
        let (handle, dispatcher) = UiDispatcher::spawn(view).unwrap();

        let worker = handle.clone();
        thread::spawn(move || {
            worker.post(UiEvent::NowPlaying {
                title: "A".into(),
                artist: String::new(),
                album: String::new(),
            });
            worker.post(UiEvent::Progress { current_ms: 26, total_ms: 2600 });
        })
        .join()
        .unwrap();
        handle.post(UiEvent::ResetTransport);
        drop(handle);
        dispatcher.join();

        assert_eq!(
            *calls.lock(),
            vec!["now:A".to_string(), "progress:26/2600".into(), "reset".into()]
        );
    }

    #[test]
    fn test_post_after_view_gone_is_harmless() {
        let (handle, rx) = UiHandle::channel();
        drop(rx);
        handle.post(UiEvent::ScrubberEnabled(false));
    }
}
