//! Operator-facing progress output.
//!
//! The probe runner and the verdict announcement only see the [`Console`]
//! trait; which formatter backs it is decided once, in the CLI.

use crate::config::ConsoleStyle;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Title,
    Info,
    Ok,
    Warning,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Title => "",
            Level::Info => "[*]",
            Level::Ok => "[OK]",
            Level::Warning => "[WARNING]",
            Level::Error => "[ERROR]",
        }
    }
}

pub trait Console {
    fn print(&self, message: &str, level: Level);
}

/// Uncolored `[TAG] message` lines on stdout.
pub struct PlainConsole;

impl Console for PlainConsole {
    fn print(&self, message: &str, level: Level) {
        match level {
            Level::Title => println!("{message}"),
            _ => println!("{} {message}", level.tag()),
        }
    }
}

/// ANSI-colored output for interactive terminals.
pub struct RichConsole;

impl RichConsole {
    fn color(level: Level) -> &'static str {
        match level {
            Level::Title => "\x1b[1;36m",
            Level::Info => "\x1b[0m",
            Level::Ok => "\x1b[32m",
            Level::Warning => "\x1b[33m",
            Level::Error => "\x1b[1;31m",
        }
    }
}

impl Console for RichConsole {
    fn print(&self, message: &str, level: Level) {
        let color = Self::color(level);
        match level {
            Level::Title => println!("{color}{message}\x1b[0m"),
            _ => println!("{color}{}\x1b[0m {message}", level.tag()),
        }
    }
}

/// Swallows everything. Used when stdout carries the JSON report.
pub struct QuietConsole;

impl Console for QuietConsole {
    fn print(&self, _message: &str, _level: Level) {}
}

pub fn select(style: ConsoleStyle, quiet: bool) -> Box<dyn Console> {
    if quiet {
        return Box::new(QuietConsole);
    }
    match style {
        ConsoleStyle::Plain => Box::new(PlainConsole),
        ConsoleStyle::Rich => Box::new(RichConsole),
        ConsoleStyle::Auto => {
            if std::io::stdout().is_terminal() {
                Box::new(RichConsole)
            } else {
                Box::new(PlainConsole)
            }
        }
    }
}
