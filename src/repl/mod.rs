// Interactive shell: line parsing, session state and the read loop

#[cfg(test)]
mod tests;

use std::io::Write;

use anyhow::Result;
use async_trait::async_trait;
use console::style;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::error;

use crate::profiles::{ALL_PROFILE, parse_selection};

pub const PROMPT: &str = ">>> ";

pub const USAGE: &str = ":profile list | :profile show | :profile set <name>|all | :quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileCommand {
    List,
    Show,
    /// `None` selects `all`
    Set(Option<String>),
    /// Malformed or unknown subcommand
    Usage,
}

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Quit,
    Question(String),
    Profile(ProfileCommand),
}

impl ReplCommand {
    #[inline]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(meta) = line.strip_prefix(':') else {
            return Self::Question(line.to_string());
        };

        let mut parts = meta.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (command, args.as_slice()) {
            ("quit" | "exit" | "q", []) => Self::Quit,
            ("profile", [sub, rest @ ..]) => Self::Profile(parse_profile(sub, rest)),
            ("list" | "show" | "set", rest) => Self::Profile(parse_profile(command, rest)),
            _ => Self::Profile(ProfileCommand::Usage),
        }
    }
}

fn parse_profile(sub: &str, args: &[&str]) -> ProfileCommand {
    match (sub, args) {
        ("list", []) => ProfileCommand::List,
        ("show", []) => ProfileCommand::Show,
        ("set", [name]) => ProfileCommand::Set(parse_selection(name).map(str::to_string)),
        _ => ProfileCommand::Usage,
    }
}

/// Mutable state of one REPL run; only the persisted pointer outlives it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    active_profile: Option<String>,
}

impl Session {
    #[inline]
    pub fn new(active_profile: Option<String>) -> Self {
        Self { active_profile }
    }

    #[inline]
    pub fn active_profile(&self) -> Option<&str> {
        self.active_profile.as_deref()
    }

    #[inline]
    pub fn set_active_profile(&mut self, profile: Option<String>) {
        self.active_profile = profile;
    }

    /// Display name of the active profile
    #[inline]
    pub fn label(&self) -> &str {
        self.active_profile().unwrap_or(ALL_PROFILE)
    }
}

/// Actions the read loop delegates to
#[async_trait]
pub trait ReplHandler: Send + Sync {
    /// Answer one question under `profile`
    async fn answer(&self, question: &str, profile: Option<&str>) -> Result<()>;

    /// Run a `:profile` command, updating the session on `set`
    fn profile_command(&self, session: &mut Session, command: ProfileCommand) -> Result<()>;
}

/// Read commands from `input` until `:quit`, end of input or Ctrl-C.
///
/// A failing question or profile command is reported and the loop goes on
/// with the next line. Only input errors end it with `Err`.
#[inline]
pub async fn run<R>(input: R, handler: &dyn ReplHandler, mut session: Session) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        print!("{}", PROMPT);
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\n{}", style("bye").dim());
            return Ok(());
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => {
                println!("{}", style("bye").dim());
                return Ok(());
            }
            ReplCommand::Profile(command) => {
                if let Err(e) = handler.profile_command(&mut session, command) {
                    println!("{} {:#}", style("Error:").red(), e);
                }
            }
            ReplCommand::Question(question) => {
                if let Err(e) = handler.answer(&question, session.active_profile()).await {
                    error!("Question failed: {:#}", e);
                    println!("{} {:#}", style("Error:").red(), e);
                }
            }
        }
    }
}
