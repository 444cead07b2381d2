// Playback controller
// Owns the play/pause/stop state machine and the one playback thread.
//
// Locking rules:
// - `Shared::inner` guards state, cursor and seek bookkeeping. Every state change
//   and every notify happens with it held; every wait re-checks its predicate.
// - The playlist lock is never taken while `inner` is held.
// - `worker` serializes play/stop: it is held across stop, join and spawn.

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::clock;
use crate::audio::source::{FrameSource, Session};
use crate::error::{PlayerError, Result};
use crate::library::Track;
use crate::queue::Playlist;
use crate::settings::PlaybackSettings;
use crate::ui::{TransportButtons, UiEvent, UiHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Point-in-time view of the controller, for progress display and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub track: Option<Track>,
    pub frame: u64,
    pub elapsed_ms: f64,
    pub total_ms: f64,
    pub pending_seek: Option<u64>,
    pub session_open: bool,
}

struct SeekRequest {
    ticket: u64,
    frame: u64,
}

struct Inner {
    state: PlaybackState,
    track: Option<Track>,
    cursor: u64,
    session_open: bool,
    session_id: u64,
    seek: Option<SeekRequest>,
    seeks_issued: u64,
    seeks_settled: u64,
    landed_frame: u64,
}

impl Inner {
    /// Drop any pending seek and release everyone waiting on one.
    fn settle_seeks(&mut self) {
        self.seek = None;
        self.seeks_settled = self.seeks_issued;
    }
}

struct Shared {
    inner: Mutex<Inner>,
    /// Playback thread parks here while paused.
    wake: Condvar,
    /// Command threads wait here for a seek to land.
    settled: Condvar,
    /// Set while the user drags the scrubber; progress reports are skipped.
    scrubbing: AtomicBool,
}

pub struct PlaybackController {
    shared: Arc<Shared>,
    source: Arc<dyn FrameSource>,
    playlist: Arc<Mutex<Playlist>>,
    ui: UiHandle,
    settings: PlaybackSettings,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackController {
    pub fn new(
        source: Arc<dyn FrameSource>,
        playlist: Arc<Mutex<Playlist>>,
        ui: UiHandle,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: PlaybackState::Stopped,
                    track: None,
                    cursor: 0,
                    session_open: false,
                    session_id: 0,
                    seek: None,
                    seeks_issued: 0,
                    seeks_settled: 0,
                    landed_frame: 0,
                }),
                wake: Condvar::new(),
                settled: Condvar::new(),
                scrubbing: AtomicBool::new(false),
            }),
            source,
            playlist,
            ui,
            settings,
            worker: Mutex::new(None),
        }
    }

    pub fn playlist(&self) -> &Arc<Mutex<Playlist>> {
        &self.playlist
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.inner.lock().state
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let inner = self.shared.inner.lock();
        let (ms_per_frame, total_ms) = inner
            .track
            .as_ref()
            .map(|t| (t.ms_per_frame, t.duration_ms))
            .unwrap_or((0.0, 0.0));
        PlaybackSnapshot {
            state: inner.state,
            track: inner.track.clone(),
            frame: inner.cursor,
            elapsed_ms: clock::elapsed_ms(inner.cursor, ms_per_frame),
            total_ms,
            pending_seek: inner.seek.as_ref().map(|s| s.frame),
            session_open: inner.session_open,
        }
    }

    /// Start playing `track` from its first frame.
    ///
    /// Any previous playback thread is stopped and joined first, so its session is
    /// closed before the new one opens. Returns once the new thread has opened its
    /// session; open failures come back here and are also shown in the UI.
    pub fn play_track(&self, track: Track) -> Result<()> {
        let mut worker = self.worker.lock();
        self.halt(&mut worker);

        let buttons = {
            let mut playlist = self.playlist.lock();
            if let Some(index) = playlist.position_of(track.id) {
                playlist.set_current_index(index);
            }
            TransportButtons::for_playlist(&playlist)
        };

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let playback = PlaybackThread {
            shared: Arc::clone(&self.shared),
            source: Arc::clone(&self.source),
            playlist: Arc::clone(&self.playlist),
            ui: self.ui.clone(),
            settings: self.settings.clone(),
        };
        let handle = thread::Builder::new()
            .name("playback".into())
            .spawn(move || playback.run(track, buttons, ready_tx))?;
        *worker = Some(handle);

        ready_rx.recv().unwrap_or_else(|_| {
            Err(PlayerError::Io(std::io::Error::other(
                "playback thread exited before opening its session",
            )))
        })
    }

    /// Play the playlist entry at `index`. `Ok(false)` if there is no such entry.
    pub fn play_index(&self, index: usize) -> Result<bool> {
        let track = {
            let mut playlist = self.playlist.lock();
            if !playlist.set_current_index(index) {
                return Ok(false);
            }
            playlist.get(index).cloned()
        };
        match track {
            Some(track) => self.play_track(track).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn advance_to_next(&self) -> Result<bool> {
        let index = self.playlist.lock().next_index();
        match index {
            Some(index) => self.play_index(index),
            None => Ok(false),
        }
    }

    pub fn advance_to_previous(&self) -> Result<bool> {
        let index = self.playlist.lock().previous_index();
        match index {
            Some(index) => self.play_index(index),
            None => Ok(false),
        }
    }

    pub fn pause(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.state != PlaybackState::Playing {
            return false;
        }
        inner.state = PlaybackState::Paused;
        self.ui.post(UiEvent::PlayPauseIcon { playing: false });
        log::info!("[Player] Paused at frame {}", inner.cursor);
        true
    }

    pub fn resume(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.state != PlaybackState::Paused {
            return false;
        }
        inner.state = PlaybackState::Playing;
        self.shared.wake.notify_all();
        self.ui.post(UiEvent::PlayPauseIcon { playing: true });
        log::info!("[Player] Resumed at frame {}", inner.cursor);
        true
    }

    /// The play/pause button. When stopped, plays the current playlist entry
    /// (or the first one).
    pub fn toggle_play_pause(&self) -> Result<()> {
        match self.state() {
            PlaybackState::Playing => {
                self.pause();
            }
            PlaybackState::Paused => {
                self.resume();
            }
            PlaybackState::Stopped => {
                let index = {
                    let playlist = self.playlist.lock();
                    playlist
                        .current_index()
                        .or_else(|| (!playlist.is_empty()).then_some(0))
                };
                if let Some(index) = index {
                    self.play_index(index)?;
                }
            }
        }
        Ok(())
    }

    /// Stop playback and wait for the playback thread to exit. Safe to repeat.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        if self.halt(&mut worker) {
            let total_ms = self.snapshot().total_ms;
            self.ui.post(UiEvent::Progress {
                current_ms: 0,
                total_ms: total_ms as u64,
            });
            self.ui.post(UiEvent::ScrubberEnabled(false));
            self.ui.post(UiEvent::ResetTransport);
            log::info!("[Player] Stopped");
        }
    }

    /// Move playback to `target_ms` without decoding the frames in between.
    ///
    /// Blocks until the playback thread has repositioned and returns the frame it
    /// landed on, or `None` if nothing is playing or the session ended first.
    pub fn seek_to(&self, target_ms: f64) -> Option<u64> {
        let mut inner = self.shared.inner.lock();
        if inner.state == PlaybackState::Stopped {
            return None;
        }
        let track = inner.track.as_ref()?;
        let frame = clock::frame_for_ms(target_ms, track.ms_per_frame).min(track.frame_count);

        inner.seeks_issued += 1;
        let ticket = inner.seeks_issued;
        let session_id = inner.session_id;
        inner.seek = Some(SeekRequest { ticket, frame });
        self.shared.wake.notify_all();

        while inner.seeks_settled < ticket
            && inner.state != PlaybackState::Stopped
            && inner.session_id == session_id
        {
            self.shared.settled.wait(&mut inner);
        }

        let landed = inner.state != PlaybackState::Stopped
            && inner.session_id == session_id
            && inner.seeks_settled >= ticket;
        landed.then_some(inner.landed_frame)
    }

    /// Scrubber pressed: stop reporting progress so the handle isn't yanked around.
    pub fn begin_scrub(&self) {
        self.shared.scrubbing.store(true, Ordering::Release);
    }

    /// Scrubber dragged: show the time under the handle.
    pub fn preview_scrub(&self, target_ms: f64) {
        let total_ms = self.snapshot().total_ms;
        self.ui.post(UiEvent::Progress {
            current_ms: target_ms.clamp(0.0, total_ms) as u64,
            total_ms: total_ms as u64,
        });
    }

    /// Scrubber released: seek there and resume progress reports.
    pub fn end_scrub(&self, target_ms: f64) -> Option<u64> {
        let landed = self.seek_to(target_ms);
        self.shared.scrubbing.store(false, Ordering::Release);
        landed
    }

    /// Mark Stopped, wake a parked thread and join it. Returns whether anything was playing.
    fn halt(&self, worker: &mut Option<JoinHandle<()>>) -> bool {
        let was_active = {
            let mut inner = self.shared.inner.lock();
            let was_active = inner.state != PlaybackState::Stopped;
            inner.state = PlaybackState::Stopped;
            self.shared.wake.notify_all();
            self.shared.settled.notify_all();
            was_active
        };

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                log::error!("[Player] Playback thread panicked");
                let mut inner = self.shared.inner.lock();
                inner.session_open = false;
                inner.cursor = 0;
                inner.settle_seeks();
            }
        }
        was_active
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the playback thread needs, moved onto it at spawn.
struct PlaybackThread {
    shared: Arc<Shared>,
    source: Arc<dyn FrameSource>,
    playlist: Arc<Mutex<Playlist>>,
    ui: UiHandle,
    settings: PlaybackSettings,
}

impl PlaybackThread {
    fn run(self, track: Track, buttons: TransportButtons, ready: mpsc::SyncSender<Result<()>>) {
        let opened = {
            let mut inner = self.shared.inner.lock();
            match self.source.open(&track) {
                Ok(session) => {
                    inner.state = PlaybackState::Playing;
                    self.begin(&mut inner, &track, buttons);
                    Ok(session)
                }
                Err(e) => {
                    inner.track = Some(track.clone());
                    inner.cursor = 0;
                    Err(e)
                }
            }
        };

        match opened {
            Ok(session) => {
                let _ = ready.send(Ok(()));
                self.play_loop(track, session);
            }
            Err(e) => {
                self.report_failure(&e);
                let _ = ready.send(Err(e));
            }
        }
    }

    /// Record a freshly opened session. Caller holds `inner` and has set the state.
    fn begin(&self, inner: &mut Inner, track: &Track, buttons: TransportButtons) {
        debug_assert!(!inner.session_open, "previous session still open");
        inner.track = Some(track.clone());
        inner.cursor = 0;
        inner.session_open = true;
        inner.session_id += 1;
        inner.settle_seeks();
        self.shared.settled.notify_all();

        self.ui.post(UiEvent::NowPlaying {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
        });
        self.ui.post(UiEvent::Transport(buttons));
        self.ui.post(UiEvent::PlayPauseIcon {
            playing: inner.state == PlaybackState::Playing,
        });
        self.ui.post(UiEvent::ScrubberEnabled(true));
        self.ui.post(UiEvent::Progress {
            current_ms: 0,
            total_ms: track.duration_ms as u64,
        });
        log::info!("[Player] Now playing: {}", track.title);
    }

    fn play_loop(&self, mut track: Track, mut session: Box<dyn Session>) {
        let interval = u64::from(self.settings.progress_interval_frames.max(1));
        let mut output_paused = false;

        loop {
            let mut inner = self.shared.inner.lock();
            let hold_output = inner.state == PlaybackState::Paused;
            if hold_output != output_paused && inner.state != PlaybackState::Stopped {
                drop(inner);
                session.set_paused(hold_output);
                output_paused = hold_output;
                continue;
            }
            if inner.state == PlaybackState::Paused && inner.seek.is_none() {
                self.shared.wake.wait(&mut inner);
                continue;
            }

            if inner.state == PlaybackState::Stopped {
                session.close();
                inner.session_open = false;
                inner.cursor = 0;
                inner.settle_seeks();
                self.shared.settled.notify_all();
                log::debug!("[Player] Playback thread exiting");
                return;
            }

            if let Some(request) = inner.seek.take() {
                let from = inner.cursor;
                drop(inner);
                match self.reposition(&track, session, from, request.frame, output_paused) {
                    Ok((repositioned, frame)) => {
                        session = repositioned;
                        let mut inner = self.shared.inner.lock();
                        inner.cursor = frame;
                        inner.landed_frame = frame;
                        inner.seeks_settled = inner.seeks_settled.max(request.ticket);
                        self.shared.settled.notify_all();
                        self.ui.post(progress_event(&track, frame));
                        log::debug!("[Player] Seeked from frame {} to {}", from, frame);
                    }
                    Err((session, e)) => {
                        self.fail(session, e);
                        return;
                    }
                }
                continue;
            }
            drop(inner);

            let played = match session.decode_next() {
                Ok(Some(samples)) => session.write(&samples).map(|()| true),
                Ok(None) => Ok(false),
                Err(e) => Err(e),
            };

            match played {
                Ok(true) => {
                    // Under the lock, so no report can follow a pause
                    let mut inner = self.shared.inner.lock();
                    inner.cursor += 1;
                    if inner.state == PlaybackState::Playing
                        && inner.cursor % interval == 0
                        && !self.shared.scrubbing.load(Ordering::Acquire)
                    {
                        self.ui.post(progress_event(&track, inner.cursor));
                    }
                }
                Ok(false) => match self.finish(&track, session) {
                    Some((next_track, next_session)) => {
                        track = next_track;
                        session = next_session;
                    }
                    None => return,
                },
                Err(e) => {
                    self.fail(Some(session), e);
                    return;
                }
            }
        }
    }

    /// Skip forward to `target`, then drop whatever the output still holds from
    /// before the jump. Going backwards reopens the track and skips from the top,
    /// since the bitstream only reads forward.
    ///
    /// On failure the session (if one is still open) comes back with the error.
    fn reposition(
        &self,
        track: &Track,
        mut session: Box<dyn Session>,
        from: u64,
        target: u64,
        output_paused: bool,
    ) -> std::result::Result<(Box<dyn Session>, u64), (Option<Box<dyn Session>>, PlayerError)> {
        let mut frame = from;
        if target < from {
            let mut inner = self.shared.inner.lock();
            session.close();
            inner.session_open = false;
            session = match self.source.open(track) {
                Ok(reopened) => reopened,
                Err(e) => {
                    // No session left: drop to Stopped under the same lock
                    inner.state = PlaybackState::Stopped;
                    inner.cursor = 0;
                    inner.settle_seeks();
                    self.shared.settled.notify_all();
                    return Err((None, e));
                }
            };
            inner.session_open = true;
            if output_paused {
                session.set_paused(true);
            }
            frame = 0;
        }

        while frame < target {
            match session.skip_next() {
                Ok(true) => frame += 1,
                Ok(false) => break,
                Err(e) => return Err((Some(session), e)),
            }
        }
        session.flush();
        Ok((session, frame))
    }

    /// End of stream: move on to the next playlist entry, or stop.
    fn finish(&self, track: &Track, mut session: Box<dyn Session>) -> Option<(Track, Box<dyn Session>)> {
        session.drain();

        // The playlist cursor moves only after the stop check below
        let upcoming = if self.settings.auto_advance {
            let playlist = self.playlist.lock();
            playlist.next_index().and_then(|index| {
                let buttons = TransportButtons::at(&playlist, index);
                playlist.get(index).cloned().map(|next| (next, buttons))
            })
        } else {
            None
        };

        let mut inner = self.shared.inner.lock();
        session.close();
        inner.session_open = false;
        inner.cursor = 0;

        let stopped_by_user = inner.state == PlaybackState::Stopped;
        let (next, buttons) = match upcoming {
            Some(upcoming) if !stopped_by_user => upcoming,
            _ => {
                inner.state = PlaybackState::Stopped;
                inner.settle_seeks();
                self.shared.settled.notify_all();
                if !stopped_by_user {
                    self.ui.post(UiEvent::Progress {
                        current_ms: 0,
                        total_ms: track.duration_ms as u64,
                    });
                    self.ui.post(UiEvent::ScrubberEnabled(false));
                    self.ui.post(UiEvent::ResetTransport);
                    log::info!("[Player] Reached the end of the queue");
                }
                return None;
            }
        };

        match self.source.open(&next) {
            Ok(next_session) => {
                self.begin(&mut inner, &next, buttons);
                drop(inner);
                self.select(&next);
                Some((next, next_session))
            }
            Err(e) => {
                inner.track = Some(next.clone());
                inner.state = PlaybackState::Stopped;
                inner.settle_seeks();
                self.shared.settled.notify_all();
                drop(inner);
                self.select(&next);
                self.report_failure(&e);
                None
            }
        }
    }

    /// Point the playlist at the track auto-advance moved to.
    fn select(&self, track: &Track) {
        let mut playlist = self.playlist.lock();
        if let Some(index) = playlist.position_of(track.id) {
            playlist.set_current_index(index);
        }
    }

    /// A session error ends playback; the UI hears about it before the thread exits.
    fn fail(&self, session: Option<Box<dyn Session>>, error: PlayerError) {
        {
            let mut inner = self.shared.inner.lock();
            if let Some(session) = session {
                session.close();
            }
            inner.session_open = false;
            inner.state = PlaybackState::Stopped;
            inner.cursor = 0;
            inner.settle_seeks();
            self.shared.settled.notify_all();
        }
        self.report_failure(&error);
    }

    fn report_failure(&self, error: &PlayerError) {
        log::error!("[Player] Playback failed: {}", error);
        self.ui.post(UiEvent::Error(error.to_string()));
        self.ui.post(UiEvent::ScrubberEnabled(false));
        self.ui.post(UiEvent::ResetTransport);
    }
}

fn progress_event(track: &Track, frame: u64) -> UiEvent {
    UiEvent::Progress {
        current_ms: clock::elapsed_ms(frame, track.ms_per_frame) as u64,
        total_ms: track.duration_ms as u64,
    }
}
