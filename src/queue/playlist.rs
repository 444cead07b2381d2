// Ordered track list with a current position
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::audio::clock;
use crate::library::Track;

/// One row of the queue table as the UI shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: String,
}

#[derive(Debug, Default, Clone)]
pub struct Playlist {
    tracks: Vec<Track>,
    current: Option<usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Make `index` the current track. Out-of-range indices are ignored.
    pub fn set_current_index(&mut self, index: usize) -> bool {
        if index < self.tracks.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_index().is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.previous_index().is_some()
    }

    pub fn next_index(&self) -> Option<usize> {
        self.current
            .map(|i| i + 1)
            .filter(|&i| i < self.tracks.len())
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.current.and_then(|i| i.checked_sub(1))
    }

    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Remove the track at `index`, keeping the current position on the same track.
    ///
    /// Removing the current track leaves no current track.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let removed = self.tracks.remove(index);
        self.current = match self.current {
            Some(cur) if cur == index => None,
            Some(cur) if cur > index => Some(cur - 1),
            other => other,
        };
        Some(removed)
    }

    /// Shuffle the order. The current track moves to the front so that
    /// everything else is still ahead of it.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match self.current {
            Some(cur) => {
                self.tracks.swap(0, cur);
                self.tracks[1..].shuffle(rng);
                self.current = Some(0);
            }
            None => self.tracks.shuffle(rng),
        }
    }

    pub fn display_rows(&self) -> Vec<DisplayRow> {
        self.tracks
            .iter()
            .map(|t| DisplayRow {
                id: t.id,
                title: t.title.clone(),
                artist: t.artist.clone(),
                album: t.album.clone(),
                duration: clock::format_duration(t.duration_ms),
            })
            .collect()
    }
}
