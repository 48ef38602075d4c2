// src/console.rs

//! Line-oriented control console.
//!
//! Each line read from stdin is parsed into a [`ConsoleCommand`] and turned
//! into a task on the engine queue; the console itself never touches
//! sessions.
//!
//! ```text
//! reload            recreate every session from the module table
//! reload <id>       recreate one session
//! remove <id>       destroy one session
//! list              print live sessions and their states
//! exec <id> <text>  evaluate text inside a session's engine
//! quit              stop the console
//! ```

use std::str::FromStr;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::engine::{DispatchQueue, Host};
use crate::types::SessionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    ReloadAll,
    Reload(SessionId),
    Remove(SessionId),
    List,
    Exec { id: SessionId, text: String },
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match (word, rest) {
            ("reload", "") => Ok(ConsoleCommand::ReloadAll),
            ("reload", id) => Ok(ConsoleCommand::Reload(single_id(id)?)),
            ("remove", "") => Err("usage: remove <id>".to_string()),
            ("remove", id) => Ok(ConsoleCommand::Remove(single_id(id)?)),
            ("list", "") => Ok(ConsoleCommand::List),
            ("exec", rest) => match rest.split_once(char::is_whitespace) {
                Some((id, text)) if !text.trim().is_empty() => Ok(ConsoleCommand::Exec {
                    id: id.to_string(),
                    text: text.trim().to_string(),
                }),
                _ => Err("usage: exec <id> <text>".to_string()),
            },
            ("quit" | "exit", "") => Ok(ConsoleCommand::Quit),
            _ => Err(format!("unknown command: {line}")),
        }
    }
}

fn single_id(s: &str) -> Result<SessionId, String> {
    if s.contains(char::is_whitespace) {
        Err(format!("expected a single session id, got '{s}'"))
    } else {
        Ok(s.to_string())
    }
}

impl ConsoleCommand {
    /// Queue the work for this command. Returns `false` for `quit`.
    pub fn dispatch(self, queue: &DispatchQueue<Host>) -> Result<bool> {
        match self {
            ConsoleCommand::ReloadAll => queue.dispatch(|host: &mut Host| {
                host.reload_all();
                Ok(())
            })?,
            ConsoleCommand::Reload(id) => queue.dispatch(move |host: &mut Host| {
                let report = host.reload_one(&id)?;
                info!(session = %report.id, loaded = report.is_loaded(), "reloaded single session");
                Ok(())
            })?,
            ConsoleCommand::Remove(id) => queue.dispatch(move |host: &mut Host| {
                host.remove(&id)?;
                Ok(())
            })?,
            ConsoleCommand::List => queue.dispatch(|host: &mut Host| {
                let states = host.registry().states();
                println!("sessions ({}):", states.len());
                for (id, state) in states {
                    println!("  - {id}: {state}");
                }
                Ok(())
            })?,
            ConsoleCommand::Exec { id, text } => queue.dispatch(move |host: &mut Host| {
                host.execute(&id, &text)?;
                Ok(())
            })?,
            ConsoleCommand::Quit => return Ok(false),
        }
        Ok(true)
    }
}

/// Read commands from `input` until EOF or `quit`.
pub async fn run_console<R>(input: R, queue: DispatchQueue<Host>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    info!("console ready (reload, reload <id>, remove <id>, list, exec <id> <text>, quit)");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ConsoleCommand>() {
            Ok(command) => {
                debug!(?command, "console command");
                if !command.dispatch(&queue)? {
                    break;
                }
            }
            Err(message) => warn!("{message}"),
        }
    }

    debug!("console finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        assert_eq!("reload".parse::<ConsoleCommand>(), Ok(ConsoleCommand::ReloadAll));
        assert_eq!(" reload app ".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Reload("app".into())));
        assert_eq!("remove lib".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Remove("lib".into())));
        assert_eq!("list".parse::<ConsoleCommand>(), Ok(ConsoleCommand::List));
        assert_eq!(
            "exec app app_status();".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Exec {
                id: "app".into(),
                text: "app_status();".into()
            })
        );
        assert_eq!("quit".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!("remove".parse::<ConsoleCommand>().is_err());
        assert!("remove a b".parse::<ConsoleCommand>().is_err());
        assert!("exec app".parse::<ConsoleCommand>().is_err());
        assert!("list all".parse::<ConsoleCommand>().is_err());
        assert!("frobnicate".parse::<ConsoleCommand>().is_err());
    }
}
