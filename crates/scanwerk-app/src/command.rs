// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator commands and their one-line text form.

use std::path::PathBuf;
use std::str::FromStr;

use scanwerk_core::error::ScanwerkError;
use scanwerk_core::Point;

/// A discrete operator action, applied between frames.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddPage,
    SavePdf,
    /// Abandon the open document without saving.
    Discard,
    ToggleEdit,
    PointerDown(Point),
    PointerMove(Point),
    PointerUp(Point),
    SwitchCamera,
    SelectFolder(PathBuf),
    OpenFolder,
    Exit,
}

/// Accepted spellings, shown when a line cannot be parsed.
pub const USAGE: &str = "commands: add | save | discard | edit | down X Y | move X Y | up X Y | \
                         camera | folder PATH | open | exit";

impl FromStr for Command {
    type Err = ScanwerkError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "add" | "scan" | "add_page" => Command::AddPage,
            "save" | "save_pdf" => Command::SavePdf,
            "discard" => Command::Discard,
            "edit" | "toggle_edit" => Command::ToggleEdit,
            "down" => Command::PointerDown(parse_point(rest)?),
            "move" => Command::PointerMove(parse_point(rest)?),
            "up" => Command::PointerUp(parse_point(rest)?),
            "camera" | "switch_camera" => Command::SwitchCamera,
            "folder" | "select_folder" => {
                if rest.is_empty() {
                    return Err(ScanwerkError::InvalidCommand("folder needs a path".into()));
                }
                Command::SelectFolder(PathBuf::from(rest))
            }
            "open" | "open_folder" => Command::OpenFolder,
            "exit" | "quit" => Command::Exit,
            "" => return Err(ScanwerkError::InvalidCommand("empty line".into())),
            other => {
                return Err(ScanwerkError::InvalidCommand(format!(
                    "unknown command `{other}`; {USAGE}"
                )));
            }
        };

        let takes_args = matches!(
            command,
            Command::PointerDown(_)
                | Command::PointerMove(_)
                | Command::PointerUp(_)
                | Command::SelectFolder(_)
        );
        if !takes_args && !rest.is_empty() {
            return Err(ScanwerkError::InvalidCommand(format!(
                "`{word}` takes no arguments"
            )));
        }
        Ok(command)
    }
}

fn parse_point(args: &str) -> Result<Point, ScanwerkError> {
    let mut parts = args.split_whitespace();
    let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ScanwerkError::InvalidCommand(format!(
            "expected two coordinates, got `{args}`"
        )));
    };
    let coordinate = |s: &str| {
        s.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ScanwerkError::InvalidCommand(format!("`{s}` is not a coordinate")))
    };
    Ok(Point::new(coordinate(x)?, coordinate(y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_commands() {
        assert_eq!("add".parse::<Command>().expect("parse"), Command::AddPage);
        assert_eq!("  SAVE ".parse::<Command>().expect("parse"), Command::SavePdf);
        assert_eq!("edit".parse::<Command>().expect("parse"), Command::ToggleEdit);
        assert_eq!("quit".parse::<Command>().expect("parse"), Command::Exit);
    }

    #[test]
    fn parses_pointer_coordinates() {
        assert_eq!(
            "down 50 50".parse::<Command>().expect("parse"),
            Command::PointerDown(Point::new(50.0, 50.0))
        );
        assert_eq!(
            "up 10.5 80".parse::<Command>().expect("parse"),
            Command::PointerUp(Point::new(10.5, 80.0))
        );
    }

    #[test]
    fn folder_keeps_spaces_in_path() {
        assert_eq!(
            "folder /home/me/My Scans".parse::<Command>().expect("parse"),
            Command::SelectFolder(PathBuf::from("/home/me/My Scans"))
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in ["", "print", "down 1", "down 1 2 3", "move x 2", "save now", "folder", "up NaN 3"] {
            assert!(
                matches!(line.parse::<Command>(), Err(ScanwerkError::InvalidCommand(_))),
                "`{line}` should be rejected"
            );
        }
    }
}
