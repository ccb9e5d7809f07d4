//! Producer command lines
//!
//! The browser side writes one command per line:
//!
//! ```text
//! <surface> <verb> [argument]
//! weread events [{"t":"dom","s":42}]
//! weread book on
//! dedao page-turn
//! cleanup
//! ```
//!
//! `cleanup` and `quit` take no surface. Everything after the verb is the
//! argument, verbatim, so JSON payloads may contain spaces.

use core::fmt;
use core::str::FromStr;

use eink_refresh::PolicyMode;

/// One of the two reading surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Web book reader
    Weread,
    /// E-book platform
    Dedao,
}

impl Surface {
    /// Tag used on the command line and in logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Surface::Weread => "weread",
            Surface::Dedao => "dedao",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Surface {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weread" => Ok(Surface::Weread),
            "dedao" => Ok(Surface::Dedao),
            other => Err(CommandError::UnknownSurface(other.to_owned())),
        }
    }
}

/// Action aimed at one surface's engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Page-script event payload
    Events(String),
    /// Page turned
    PageTurn,
    /// Page load finished
    LoadFinished,
    /// Menu opened or closed
    Menu,
    /// Change burst ended
    BurstEnd,
    /// Content finished rendering
    ContentReady,
    /// Menu overlay hidden
    MenuHidden,
    /// Explicit click/page-turn gesture
    Click,
    /// Surface became book-like or not
    Book(bool),
    /// Explicit policy selection
    Policy(PolicyMode),
    /// Log diagnostics
    Stats,
}

/// One parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Forward an action to a surface engine
    Surface(Surface, Action),
    /// Manual full cleanup, bypassing both engines
    Cleanup,
    /// Stop the shell
    Quit,
}

/// A line that could not be understood.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Blank line
    #[error("empty command")]
    Empty,
    /// First word is not a known surface or global command
    #[error("unknown surface {0:?}")]
    UnknownSurface(String),
    /// Surface given without a verb
    #[error("missing verb for {0}")]
    MissingVerb(Surface),
    /// Verb not recognised
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),
    /// Verb needs an argument that is missing or invalid
    #[error("bad argument for {verb}: {arg:?}")]
    BadArgument {
        /// Verb
        verb: &'static str,
        /// Offending argument
        arg: String,
    },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = split_word(line);
        match head {
            "" => return Err(CommandError::Empty),
            "cleanup" => return Ok(Command::Cleanup),
            "quit" => return Ok(Command::Quit),
            _ => {}
        }

        let surface: Surface = head.parse()?;
        let (verb, arg) = split_word(rest);
        let action = match verb {
            "" => return Err(CommandError::MissingVerb(surface)),
            "events" => {
                if arg.is_empty() {
                    return Err(bad("events", arg));
                }
                Action::Events(arg.to_owned())
            }
            "page-turn" => Action::PageTurn,
            "load-finished" => Action::LoadFinished,
            "menu" => Action::Menu,
            "menu-hidden" => Action::MenuHidden,
            "burst-end" => Action::BurstEnd,
            "content-ready" => Action::ContentReady,
            "click" => Action::Click,
            "book" => match arg {
                "on" | "true" | "1" => Action::Book(true),
                "off" | "false" | "0" => Action::Book(false),
                _ => return Err(bad("book", arg)),
            },
            "policy" => match arg {
                "reading" => Action::Policy(PolicyMode::ReadingFirst),
                "interaction" => Action::Policy(PolicyMode::InteractionFirst),
                "balanced" => Action::Policy(PolicyMode::Balanced),
                _ => return Err(bad("policy", arg)),
            },
            "stats" => Action::Stats,
            other => return Err(CommandError::UnknownVerb(other.to_owned())),
        };
        Ok(Command::Surface(surface, action))
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn bad(verb: &'static str, arg: &str) -> CommandError {
    CommandError::BadArgument {
        verb,
        arg: arg.to_owned(),
    }
}
