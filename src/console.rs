//! Console command parsing and the stdin driver.
//!
//! The dashboard is driven by one-line commands. Parsing is pure so it can
//! be tested directly; the driver runs on a dedicated thread and feeds
//! events into the view loop's channel.

use std::io::BufRead;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use crate::projection::ValueKind;
use crate::state_machine::{Event, Tab};

pub const HELP_TEXT: &str = "\
Commands:
  tab <organizations|users|overages|events>   switch tab
  filter [text]                               set filter text (empty clears)
  select <entity>                             drill into one organization
  sort <column> [num|text|date]               toggle sort on a column
  clear                                       clear filter and selection
  window <days>                               set the trailing window
  refresh                                     re-run the current view
  help                                        show this text
  quit                                        exit";

/// One parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Tab(Tab),
    Filter(String),
    Select(String),
    Sort { column: String, kind: ValueKind },
    Clear,
    Window(u32),
    Refresh,
    Help,
    Quit,
}

/// Parse a console line. Returns None for anything unrecognized, including
/// out-of-range arguments like `window 0`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb.to_lowercase().as_str() {
        "tab" => Tab::parse(rest).map(Command::Tab),
        "filter" => Some(Command::Filter(rest.to_string())),
        "select" | "open" => {
            if rest.is_empty() {
                None
            } else {
                Some(Command::Select(rest.to_string()))
            }
        }
        "sort" => {
            let mut words = rest.split_whitespace();
            let column = words.next()?.to_string();
            let kind = match words.next() {
                Some(word) => ValueKind::parse(word)?,
                None => default_kind(&column),
            };
            Some(Command::Sort { column, kind })
        }
        "clear" => Some(Command::Clear),
        "window" | "days" => rest.parse::<u32>().ok().filter(|d| *d > 0).map(Command::Window),
        "refresh" | "reload" => Some(Command::Refresh),
        "help" | "?" => Some(Command::Help),
        "quit" | "exit" | "q" => Some(Command::Quit),
        _ => None,
    }
}

/// Comparison strategy for the column keys the tables expose. Unknown
/// columns default to numeric, which covers every count and token column.
pub fn default_kind(column: &str) -> ValueKind {
    match column {
        "entity_id" | "user_id" | "username" | "email" | "account_name" | "source_type"
        | "event_name" => ValueKind::Text,
        "first_event" | "last_event" | "first_search" | "last_search" | "month" => ValueKind::Date,
        _ => ValueKind::Numeric,
    }
}

/// Map a command to its state machine event. Help is handled locally by
/// the driver and has no event.
pub fn command_event(command: Command) -> Option<Event> {
    match command {
        Command::Tab(tab) => Some(Event::TabSelected(tab)),
        Command::Filter(text) => Some(Event::FilterEdited(text)),
        Command::Select(entity) => Some(Event::DrillDown(entity)),
        Command::Sort { column, kind } => Some(Event::SortToggled { column, kind }),
        Command::Clear => Some(Event::FiltersCleared),
        Command::Window(days) => Some(Event::WindowSelected(days)),
        Command::Refresh => Some(Event::RefreshRequested),
        Command::Quit => Some(Event::Shutdown),
        Command::Help => None,
    }
}

/// Read stdin line by line on a dedicated thread and feed events into the
/// view loop. EOF and read errors both shut the loop down.
pub fn start_input_thread(tx: mpsc::Sender<Event>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut lines = stdin.lock().lines();
            loop {
                let line = match lines.next() {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        log::error!("Console: stdin read failed: {}", e);
                        let _ = tx.blocking_send(Event::Shutdown);
                        break;
                    }
                    None => {
                        let _ = tx.blocking_send(Event::Shutdown);
                        break;
                    }
                };

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match parse_command(trimmed) {
                    Some(Command::Help) => println!("{}", HELP_TEXT),
                    Some(command) => {
                        let quitting = command == Command::Quit;
                        if let Some(event) = command_event(command) {
                            if tx.blocking_send(event).is_err() {
                                break;
                            }
                        }
                        if quitting {
                            break;
                        }
                    }
                    None => println!("Unrecognized command: {:?} (try 'help')", trimmed),
                }
            }
        })
}
