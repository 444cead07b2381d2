// Terminal stand-in for the player window
use std::io::Write;

use super::{PlayerView, TransportButtons};
use crate::audio::clock::format_duration;
use crate::queue::DisplayRow;

/// Prints state changes to stdout. Progress is redrawn in place on one line.
#[derive(Debug, Default)]
pub struct ConsoleView {
    show_remaining: bool,
    progress_line: bool,
}

impl ConsoleView {
    pub fn new(show_remaining: bool) -> Self {
        Self {
            show_remaining,
            ..Self::default()
        }
    }

    fn end_progress_line(&mut self) {
        if self.progress_line {
            println!();
            self.progress_line = false;
        }
    }

    fn format_progress(&self, current_ms: u64, total_ms: u64) -> String {
        let shown = if self.show_remaining {
            format!("-{}", format_duration(total_ms.saturating_sub(current_ms) as f64))
        } else {
            format_duration(current_ms as f64)
        };
        format!("{} / {}", shown, format_duration(total_ms as f64))
    }
}

impl PlayerView for ConsoleView {
    fn set_now_playing(&mut self, title: &str, artist: &str, album: &str) {
        self.end_progress_line();
        match (artist.is_empty(), album.is_empty()) {
            (true, _) => println!("> {}", title),
            (false, true) => println!("> {} - {}", artist, title),
            (false, false) => println!("> {} - {} [{}]", artist, title, album),
        }
    }

    fn set_progress(&mut self, current_ms: u64, total_ms: u64) {
        print!("\r  {}   ", self.format_progress(current_ms, total_ms));
        let _ = std::io::stdout().flush();
        self.progress_line = true;
    }

    fn set_transport_enabled(&mut self, buttons: TransportButtons) {
        log::debug!("[UI] Transport buttons: {:?}", buttons);
    }

    fn set_play_pause_icon(&mut self, playing: bool) {
        self.end_progress_line();
        println!("{}", if playing { "[playing]" } else { "[paused]" });
    }

    fn set_scrubber_enabled(&mut self, _enabled: bool) {}

    fn reset_transport(&mut self) {
        self.end_progress_line();
        println!("[stopped]");
    }

    fn set_queue(&mut self, rows: &[DisplayRow]) {
        self.end_progress_line();
        println!("Queue ({} tracks):", rows.len());
        for (index, row) in rows.iter().enumerate() {
            let artist = if row.artist.is_empty() { "-" } else { row.artist.as_str() };
            println!("  {:>3}. {} - {} ({})", index + 1, artist, row.title, row.duration);
        }
    }

    fn show_error(&mut self, message: &str) {
        self.end_progress_line();
        eprintln!("error: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_formats() {
        assert_eq!(ConsoleView::new(false).format_progress(61_000, 180_000), "01:01 / 03:00");
        assert_eq!(ConsoleView::new(true).format_progress(61_000, 180_000), "-01:59 / 03:00");
    }
}
