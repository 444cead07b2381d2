// framedeck console player
use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use framedeck::commands::{CommandHandler, UiCommand};
use framedeck::settings::PlayerSettings;
use framedeck::state::AppState;
use framedeck::ui::{ConsoleView, UiDispatcher};

const HELP: &str = "commands: p play/pause, s stop, n next, b previous, f <sec> seek, q quit";

#[derive(Parser)]
#[command(name = "framedeck")]
#[command(about = "Play MPEG audio files with frame-accurate seeking")]
struct Args {
    /// Directory holding settings.json
    #[arg(long, default_value = ".framedeck")]
    app_dir: PathBuf,

    /// Stop at the end of each track instead of moving on
    #[arg(long)]
    no_auto_advance: bool,

    /// Audio files or folders to queue
    paths: Vec<PathBuf>,
}

#[derive(Debug, PartialEq)]
enum Input {
    Command(UiCommand),
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "p" => UiCommand::PlayPause,
        "s" => UiCommand::Stop,
        "n" => UiCommand::Next,
        "b" => UiCommand::Previous,
        "f" => {
            let secs: f64 = words.next()?.parse().ok()?;
            if !secs.is_finite() || secs < 0.0 {
                return None;
            }
            UiCommand::ScrubberReleased(secs * 1000.0)
        }
        "q" => return Some(Input::Quit),
        _ => return None,
    };
    Some(Input::Command(command))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    let mut settings = PlayerSettings::load(&args.app_dir).context("Failed to load settings")?;
    if !PlayerSettings::get_settings_path(&args.app_dir).exists() {
        if let Err(e) = settings.save(&args.app_dir) {
            log::warn!("[Settings] Could not write defaults: {}", e);
        }
    }
    if args.no_auto_advance {
        settings.playback.auto_advance = false;
    }

    let view = ConsoleView::new(settings.interface.show_remaining_time);
    let (ui, dispatcher) = UiDispatcher::spawn(view).context("Failed to start UI thread")?;
    let state = Arc::new(AppState::new(settings, ui, args.app_dir.clone()));
    let handler = CommandHandler::new(Arc::clone(&state));

    for path in args.paths {
        let command = if path.is_dir() {
            UiCommand::AddFolder(path)
        } else {
            UiCommand::AddSong(path)
        };
        handler.run(command);
    }
    if !state.playlist.lock().is_empty() {
        handler.run(UiCommand::PlayNow(0));
    }

    println!("{}", HELP);
    let mut workers = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        match parse_input(&line) {
            Some(Input::Quit) => break,
            Some(Input::Command(command)) => workers.extend(handler.dispatch(command)),
            None if line.trim().is_empty() => {}
            None => println!("{}", HELP),
        }
        workers.retain(|worker| !worker.is_finished());
    }

    for worker in workers {
        if worker.join().is_err() {
            log::error!("[Commands] Command thread panicked");
        }
    }
    state.player.stop();

    // The dispatcher exits once the last UI handle is gone
    drop(handler);
    drop(state);
    dispatcher.join();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("p"), Some(Input::Command(UiCommand::PlayPause)));
        assert_eq!(parse_input("  n "), Some(Input::Command(UiCommand::Next)));
        assert_eq!(
            parse_input("f 1.3"),
            Some(Input::Command(UiCommand::ScrubberReleased(1300.0)))
        );
        assert_eq!(parse_input("q"), Some(Input::Quit));
        assert_eq!(parse_input("f"), None);
        assert_eq!(parse_input("f -2"), None);
        assert_eq!(parse_input("x"), None);
        assert_eq!(parse_input(""), None);
    }
}
