//! Parsing of console input lines into session commands.
//!
//! One command per line, words separated by whitespace:
//!
//! ```text
//! gather ironOre      refine plank       fight basic
//! cancel gather:wood  recruit            upgrade guildHall
//! build hull          pause              resume
//! status              save               export
//! import save.json    summary            reset
//! help                quit
//! ```

use std::path::PathBuf;

use skyguild_core::runner::SessionCommand;
use skyguild_types::{Action, CombatId, ComponentId, ResourceId, UpgradeId};

/// Errors produced while parsing an input line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The first word is not a known command.
    #[error("unknown command '{command}', type 'help' for a list")]
    UnknownCommand {
        /// The unrecognized word.
        command: String,
    },

    /// The command needs an argument.
    #[error("'{command}' needs {expected}")]
    MissingArgument {
        /// The command that was given.
        command: String,
        /// Description of the missing argument.
        expected: &'static str,
    },

    /// The timer id given to `cancel` does not name an action.
    #[error("'{id}' is not an action id (expected e.g. gather:wood)")]
    InvalidAction {
        /// The unparseable id.
        id: String,
    },
}

/// A parsed input line.
#[derive(Debug)]
pub enum Input {
    /// Forward a command to the session runner.
    Send(SessionCommand),
    /// Print the session status.
    Status,
    /// Print the stored save as JSON.
    Export,
    /// Print a summary of the stored save.
    Summary,
    /// Read a save from a file and import it.
    Import(PathBuf),
    /// Print the command list.
    Help,
}

/// Command list printed by `help`.
pub const HELP: &str = "\
commands:
  gather <resource>     start gathering a raw resource
  refine <resource>     start refining a refined resource
  fight <activity>      start a combat activity
  cancel <kind:id>      cancel a running action (no refund)
  recruit               recruit a guildmate
  upgrade <id>          buy a guild upgrade
  build <component>     build an airship component
  pause | resume        suspend or resume every timer
  status                show resources, timers, and objectives
  save                  save now
  export                print the save as JSON
  import <file>         replace the save with a JSON file
  summary               show the stored save
  reset                 delete the save and start over
  quit                  save and exit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Input>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();
    let need = |expected: &'static str| {
        argument.ok_or_else(|| ParseError::MissingArgument {
            command: command.to_owned(),
            expected,
        })
    };

    let input = match command.to_ascii_lowercase().as_str() {
        "gather" => Input::Send(SessionCommand::Request(Action::Gather(ResourceId::new(
            need("a resource id")?,
        )))),
        "refine" => Input::Send(SessionCommand::Request(Action::Refine(ResourceId::new(
            need("a resource id")?,
        )))),
        "fight" | "combat" => Input::Send(SessionCommand::Request(Action::Combat(
            CombatId::new(need("an activity id")?),
        ))),
        "cancel" => {
            let id = need("an action id")?;
            let action = Action::from_timer_id(id).ok_or_else(|| ParseError::InvalidAction {
                id: id.to_owned(),
            })?;
            Input::Send(SessionCommand::Cancel(action))
        }
        "recruit" => Input::Send(SessionCommand::Recruit),
        "upgrade" => Input::Send(SessionCommand::Upgrade(UpgradeId::new(need("an upgrade id")?))),
        "build" => Input::Send(SessionCommand::Build(ComponentId::new(need("a component id")?))),
        "pause" => Input::Send(SessionCommand::Suspend),
        "resume" => Input::Send(SessionCommand::Resume),
        "save" => Input::Send(SessionCommand::Save),
        "reset" => Input::Send(SessionCommand::ClearSave),
        "quit" | "exit" => Input::Send(SessionCommand::Shutdown),
        "status" => Input::Status,
        "export" => Input::Export,
        "summary" => Input::Summary,
        "import" => Input::Import(PathBuf::from(need("a file path")?)),
        "help" | "?" => Input::Help,
        _ => {
            return Err(ParseError::UnknownCommand {
                command: command.to_owned(),
            });
        }
    };
    Ok(Some(input))
}
