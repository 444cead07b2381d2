// User command handlers
// Button presses from the window land here. Anything that can block on disk or on
// the playback thread runs on a short-lived worker thread.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use uuid::Uuid;

use crate::audio::PlaybackState;
use crate::error::Result;
use crate::library::{DirectoryScanner, Track};
use crate::state::AppState;
use crate::ui::{TransportButtons, UiEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    /// Play the selected playlist row.
    PlayNow(usize),
    PlayPause,
    Stop,
    Next,
    Previous,
    /// Remove the selected row. `id` guards against a selection that went stale.
    RemoveSelected { index: usize, id: Uuid },
    AddSong(PathBuf),
    AddFolder(PathBuf),
    Shuffle,
    ScrubberPressed,
    ScrubberDragged(f64),
    ScrubberReleased(f64),
}

impl UiCommand {
    fn runs_on_worker(&self) -> bool {
        matches!(
            self,
            UiCommand::Stop
                | UiCommand::Next
                | UiCommand::Previous
                | UiCommand::RemoveSelected { .. }
                | UiCommand::AddSong(_)
                | UiCommand::AddFolder(_)
        )
    }
}

#[derive(Clone)]
pub struct CommandHandler {
    state: Arc<AppState>,
}

impl CommandHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Handle a command from the window.
    ///
    /// Worker-thread commands return their handle; the rest finish before this returns.
    pub fn dispatch(&self, command: UiCommand) -> Option<JoinHandle<()>> {
        if !command.runs_on_worker() {
            self.run(command);
            return None;
        }

        let handler = self.clone();
        let spawned = thread::Builder::new()
            .name("command".into())
            .spawn(move || handler.run(command));
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                self.report(format!("Failed to start command thread: {}", e));
                None
            }
        }
    }

    /// Handle a command on the calling thread.
    pub fn run(&self, command: UiCommand) {
        log::debug!("[Commands] {:?}", command);
        let player = &self.state.player;

        let result = match command {
            UiCommand::PlayNow(index) => self.playback("play track", player.play_index(index)),
            UiCommand::PlayPause => {
                self.playback("play", player.toggle_play_pause().map(|()| true))
            }
            UiCommand::Stop => {
                player.stop();
                Ok(())
            }
            UiCommand::Next => self.playback("play next track", player.advance_to_next()),
            UiCommand::Previous => {
                self.playback("play previous track", player.advance_to_previous())
            }
            UiCommand::RemoveSelected { index, id } => self.remove_selected(index, id),
            UiCommand::AddSong(path) => self.add_song(&path),
            UiCommand::AddFolder(path) => self.add_folder(&path),
            UiCommand::Shuffle => {
                self.state.playlist.lock().shuffle(&mut rand::thread_rng());
                self.refresh_queue();
                Ok(())
            }
            UiCommand::ScrubberPressed => {
                player.begin_scrub();
                Ok(())
            }
            UiCommand::ScrubberDragged(ms) => {
                player.preview_scrub(ms);
                Ok(())
            }
            UiCommand::ScrubberReleased(ms) => {
                player.end_scrub(ms);
                Ok(())
            }
        };

        if let Err(message) = result {
            self.report(message);
        }
    }

    // ===== Playlist Commands =====

    fn remove_selected(&self, index: usize, id: Uuid) -> std::result::Result<(), String> {
        if self.state.playlist.lock().position_of(id).is_none() {
            return Err(format!("Failed to remove track: row {} is no longer in the playlist", index));
        }

        let snapshot = self.state.player.snapshot();
        let playing_it = snapshot.state != PlaybackState::Stopped
            && snapshot.track.is_some_and(|t| t.id == id);
        if playing_it {
            self.state.player.stop();
        }

        let removed = {
            let mut playlist = self.state.playlist.lock();
            let index = match playlist.get(index) {
                Some(track) if track.id == id => Some(index),
                _ => playlist.position_of(id),
            };
            index.and_then(|i| playlist.remove(i))
        };
        if let Some(track) = removed {
            log::info!("[Commands] Removed {} from the playlist", track.title);
        }

        self.refresh_queue();
        Ok(())
    }

    fn add_song(&self, path: &Path) -> std::result::Result<(), String> {
        let track = Track::load(path)
            .map_err(|e| format!("Failed to add {}: {}", path.display(), e))?;
        log::info!("[Commands] Added {}", track.title);
        self.state.playlist.lock().add(track);
        self.refresh_queue();
        Ok(())
    }

    fn add_folder(&self, dir: &Path) -> std::result::Result<(), String> {
        let files = DirectoryScanner::scan(dir)
            .map_err(|e| format!("Failed to scan {}: {}", dir.display(), e))?;

        // Load outside the playlist lock; one unreadable file doesn't sink the folder
        let mut tracks = Vec::with_capacity(files.len());
        for file in &files {
            match Track::load(file) {
                Ok(track) => tracks.push(track),
                Err(e) => log::warn!("[Library] Skipping {}: {}", file.display(), e),
            }
        }

        log::info!(
            "[Library] Added {} of {} files from {}",
            tracks.len(),
            files.len(),
            dir.display()
        );
        {
            let mut playlist = self.state.playlist.lock();
            for track in tracks {
                playlist.add(track);
            }
        }
        self.refresh_queue();
        Ok(())
    }

    /// Repaint the queue, and the next/previous buttons if something is loaded.
    fn refresh_queue(&self) {
        let active = self.state.player.state() != PlaybackState::Stopped;
        let (rows, buttons) = {
            let playlist = self.state.playlist.lock();
            (playlist.display_rows(), TransportButtons::for_playlist(&playlist))
        };
        self.state.ui.post(UiEvent::Queue(rows));
        if active {
            self.state.ui.post(UiEvent::Transport(buttons));
        }
    }

    // ===== Helpers =====

    /// Track failures have already been shown by the playback thread.
    fn playback(&self, what: &str, result: Result<bool>) -> std::result::Result<(), String> {
        match result {
            Ok(true) => Ok(()),
            Ok(false) => {
                log::debug!("[Commands] Nothing to {}", what);
                Ok(())
            }
            Err(e) if e.is_track_scoped() => {
                log::warn!("[Commands] Could not {}: {}", what, e);
                Ok(())
            }
            Err(e) => Err(format!("Failed to {}: {}", what, e)),
        }
    }

    fn report(&self, message: String) {
        log::error!("[Commands] {}", message);
        self.state.ui.post(UiEvent::Error(message));
    }
}
