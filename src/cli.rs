//! Interactive prompt
//!
//! Reads lines with rustyline on a dedicated thread and hands parsed
//! [`Command`]s to the async side over a channel.

use std::thread;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::translator::NoteRange;

pub const HELP: &str = "\
Commands:
  list                    List MIDI input devices
  device <index|name>     Listen to another device
  transpose <n>           Shift incoming notes by n semitones
  middle-c <note>         Treat MIDI note <note> as middle C
  period <n>              Wrap notes into windows of n semitones
  window <root> <max>     Playable note window
  range wrap|clamp        What to do with notes outside the window
  rock on|off             Channel-selected alternate octave
  bend on|off             Pitch-bend selector keys
  modifier <cc>|off       Controller driving the rest selector
  status                  Show device and settings
  help                    Show this help
  quit                    Exit";

/// A parsed prompt line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Device(String),
    Transpose(i32),
    MiddleC(i32),
    Period(i32),
    Window { root: i32, max: i32 },
    Range(NoteRange),
    Rock(bool),
    Bend(bool),
    Modifier(Option<u8>),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{command}' needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    #[error("invalid value '{value}' for '{command}'")]
    InvalidArgument { command: &'static str, value: String },
}

/// Parse one prompt line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match head.to_lowercase().as_str() {
        "list" | "ls" => Command::List,
        "device" | "dev" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument {
                    command: "device",
                    expected: "an index or a name",
                });
            }
            Command::Device(rest.join(" "))
        }
        "transpose" => Command::Transpose(number("transpose", rest.first())?),
        "middle-c" | "middlec" => Command::MiddleC(number("middle-c", rest.first())?),
        "period" => Command::Period(number("period", rest.first())?),
        "window" => Command::Window {
            root: number("window", rest.first())?,
            max: number("window", rest.get(1))?,
        },
        "range" => match rest.first().map(|w| w.to_lowercase()).as_deref() {
            Some("wrap") => Command::Range(NoteRange::Wrap),
            Some("clamp") => Command::Range(NoteRange::Clamp),
            Some(other) => return Err(invalid("range", other)),
            None => {
                return Err(ParseError::MissingArgument {
                    command: "range",
                    expected: "wrap or clamp",
                })
            }
        },
        "rock" => Command::Rock(switch("rock", rest.first())?),
        "bend" => Command::Bend(switch("bend", rest.first())?),
        "modifier" | "mod" => match rest.first() {
            Some(word) if word.eq_ignore_ascii_case("off") => Command::Modifier(None),
            Some(word) => Command::Modifier(Some(
                word.parse().map_err(|_| invalid("modifier", word))?,
            )),
            None => {
                return Err(ParseError::MissingArgument {
                    command: "modifier",
                    expected: "a controller number or 'off'",
                })
            }
        },
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

fn number(command: &'static str, word: Option<&&str>) -> Result<i32, ParseError> {
    let word = word.ok_or(ParseError::MissingArgument {
        command,
        expected: "a number",
    })?;
    word.parse().map_err(|_| invalid(command, word))
}

fn switch(command: &'static str, word: Option<&&str>) -> Result<bool, ParseError> {
    match word.map(|w| w.to_lowercase()).as_deref() {
        Some("on") | Some("true") | Some("1") => Ok(true),
        Some("off") | Some("false") | Some("0") => Ok(false),
        Some(other) => Err(invalid(command, other)),
        None => Err(ParseError::MissingArgument {
            command,
            expected: "on or off",
        }),
    }
}

fn invalid(command: &'static str, value: &str) -> ParseError {
    ParseError::InvalidArgument {
        command,
        value: value.to_string(),
    }
}

/// Run the prompt on its own thread
///
/// The thread ends after sending [`Command::Quit`] (typed, Ctrl-C or EOF) or
/// when the receiver goes away. It is detached so a blocked `readline` never
/// holds up shutdown.
pub fn spawn_prompt(tx: mpsc::UnboundedSender<Command>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("bardkeys-prompt".to_string())
        .spawn(move || run_prompt(tx))?;

    debug!("Prompt started");
    Ok(())
}

fn run_prompt(tx: mpsc::UnboundedSender<Command>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            warn!("Interactive prompt unavailable: {}", e);
            return;
        }
    };

    loop {
        let line = match editor.readline("bardkeys> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = tx.send(Command::Quit);
                break;
            }
            Err(e) => {
                eprintln!("{} {}", "prompt error:".red(), e);
                let _ = tx.send(Command::Quit);
                break;
            }
        };

        match parse_command(&line) {
            Ok(Some(command)) => {
                let _ = editor.add_history_entry(line.as_str());
                let quit = command == Command::Quit;
                if tx.send(command).is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{} {}", "✗".red(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_device_keeps_full_name() {
        assert_eq!(parse("device 2"), Command::Device("2".into()));
        assert_eq!(parse("device USB Midi Cable"), Command::Device("USB Midi Cable".into()));
        assert!(matches!(
            parse_command("device"),
            Err(ParseError::MissingArgument { command: "device", .. })
        ));
    }

    #[test]
    fn test_numeric_commands() {
        assert_eq!(parse("transpose -12"), Command::Transpose(-12));
        assert_eq!(parse("MIDDLE-C 72"), Command::MiddleC(72));
        assert_eq!(parse("period 7"), Command::Period(7));
        assert_eq!(parse("window 48 84"), Command::Window { root: 48, max: 84 });
        assert!(matches!(
            parse_command("transpose up"),
            Err(ParseError::InvalidArgument { command: "transpose", .. })
        ));
        assert!(parse_command("window 48").is_err());
    }

    #[test]
    fn test_switches() {
        assert_eq!(parse("rock on"), Command::Rock(true));
        assert_eq!(parse("bend off"), Command::Bend(false));
        assert_eq!(parse("range clamp"), Command::Range(NoteRange::Clamp));
        assert!(parse_command("rock maybe").is_err());
    }

    #[test]
    fn test_modifier() {
        assert_eq!(parse("modifier 64"), Command::Modifier(Some(64)));
        assert_eq!(parse("mod off"), Command::Modifier(None));
        assert!(parse_command("modifier 300").is_err());
    }

    #[test]
    fn test_unknown() {
        assert_eq!(
            parse_command("fly"),
            Err(ParseError::Unknown("fly".into()))
        );
        assert_eq!(parse("exit"), Command::Quit);
    }
}
