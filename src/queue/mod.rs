// Queue management module
// This module handles the play queue

pub mod playlist;

pub use playlist::{DisplayRow, Playlist};
