// Scripted in-memory frame source for engine tests
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::source::{FrameSource, Session};
use crate::error::{PlayerError, Result};
use crate::library::Track;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened(String),
    Decoded(String, u64),
    Skipped(String, u64),
    Flushed(String),
    OutputPaused(String, bool),
    Closed(String),
}

#[derive(Default)]
struct Hold {
    at: Option<(String, u64)>,
    reached: bool,
    released: bool,
}

#[derive(Default)]
struct State {
    events: Mutex<Vec<Event>>,
    open: AtomicUsize,
    max_open: AtomicUsize,
    fail_open: Mutex<HashSet<String>>,
    fail_reopen: Mutex<HashSet<String>>,
    fail_write_at: Mutex<HashMap<String, u64>>,
    corrupt_at: Mutex<HashMap<String, u64>>,
    hold: Mutex<Hold>,
    hold_changed: Condvar,
    frame_delay: Mutex<Duration>,
}

/// Tracks are identified by title. Frame `n` decodes to the single sample `n`.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<State>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_frame_delay(&self, delay: Duration) {
        *self.state.frame_delay.lock() = delay;
    }

    pub fn fail_open(&self, title: &str) {
        self.state.fail_open.lock().insert(title.to_string());
    }

    /// Let the first open of `title` succeed and fail every later one.
    pub fn fail_reopen(&self, title: &str) {
        self.state.fail_reopen.lock().insert(title.to_string());
    }

    /// Fail the device write for `frame` of `title`.
    pub fn fail_write_at(&self, title: &str, frame: u64) {
        self.state.fail_write_at.lock().insert(title.to_string(), frame);
    }

    pub fn corrupt_at(&self, title: &str, frame: u64) {
        self.state.corrupt_at.lock().insert(title.to_string(), frame);
    }

    /// Block the playback thread when it is about to decode `frame` of `title`.
    /// `frame` may equal the frame count to hold right before end of stream.
    pub fn hold_at(&self, title: &str, frame: u64) {
        *self.state.hold.lock() = Hold {
            at: Some((title.to_string(), frame)),
            reached: false,
            released: false,
        };
    }

    pub fn wait_until_held(&self) {
        let deadline = Instant::now() + WAIT_LIMIT;
        let mut hold = self.state.hold.lock();
        while !hold.reached {
            if self.state.hold_changed.wait_until(&mut hold, deadline).timed_out() {
                panic!("playback thread never reached the hold point");
            }
        }
    }

    pub fn release(&self) {
        let mut hold = self.state.hold.lock();
        hold.released = true;
        self.state.hold_changed.notify_all();
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().clone()
    }

    pub fn decoded(&self, title: &str) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Decoded(t, frame) if t == title => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self, title: &str) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Skipped(t, frame) if t == title => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn open_sessions(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    pub fn max_open_sessions(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }

    pub fn closed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Closed(_)))
            .count()
    }
}

impl FrameSource for FakeSource {
    fn open(&self, track: &Track) -> Result<Box<dyn Session>> {
        if self.state.fail_open.lock().contains(&track.title) {
            return Err(PlayerError::NotFound(track.title.clone()));
        }
        if self.state.fail_reopen.lock().contains(&track.title)
            && self.position(&Event::Opened(track.title.clone())).is_some()
        {
            return Err(PlayerError::NotFound(track.title.clone()));
        }

        let now_open = self.state.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(now_open, Ordering::SeqCst);
        self.state.events.lock().push(Event::Opened(track.title.clone()));

        Ok(Box::new(FakeSession {
            title: track.title.clone(),
            frames: track.frame_count,
            position: 0,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    title: String,
    frames: u64,
    position: u64,
    state: Arc<State>,
}

impl FakeSession {
    fn wait_if_held(&self) {
        let mut hold = self.state.hold.lock();
        let matches = hold
            .at
            .as_ref()
            .is_some_and(|(title, frame)| *title == self.title && *frame == self.position);
        if !matches {
            return;
        }
        hold.reached = true;
        self.state.hold_changed.notify_all();
        while !hold.released {
            self.state.hold_changed.wait(&mut hold);
        }
        hold.at = None;
    }
}

impl Session for FakeSession {
    fn decode_next(&mut self) -> Result<Option<Vec<f32>>> {
        self.wait_if_held();
        if self.position >= self.frames {
            return Ok(None);
        }
        if self.state.corrupt_at.lock().get(&self.title) == Some(&self.position) {
            return Err(PlayerError::Corrupt(format!("{} frame {}", self.title, self.position)));
        }

        self.state
            .events
            .lock()
            .push(Event::Decoded(self.title.clone(), self.position));
        let sample = self.position as f32;
        self.position += 1;

        let delay = *self.state.frame_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(Some(vec![sample]))
    }

    fn skip_next(&mut self) -> Result<bool> {
        if self.position >= self.frames {
            return Ok(false);
        }
        self.state
            .events
            .lock()
            .push(Event::Skipped(self.title.clone(), self.position));
        self.position += 1;
        Ok(true)
    }

    fn write(&mut self, _samples: &[f32]) -> Result<()> {
        let failing = self.state.fail_write_at.lock().get(&self.title).copied();
        match (failing, self.position.checked_sub(1)) {
            (Some(at), Some(written)) if at == written => Err(PlayerError::DeviceUnavailable(
                format!("{} frame {}", self.title, written),
            )),
            _ => Ok(()),
        }
    }

    fn flush(&mut self) {
        self.state.events.lock().push(Event::Flushed(self.title.clone()));
    }

    fn set_paused(&mut self, paused: bool) {
        self.state
            .events
            .lock()
            .push(Event::OutputPaused(self.title.clone(), paused));
    }

    fn close(self: Box<Self>) {}
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.state.events.lock().push(Event::Closed(self.title.clone()));
        self.state.open.fetch_sub(1, Ordering::SeqCst);
    }
}
