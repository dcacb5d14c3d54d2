//! Media application access through the command line
//!
//! This crate talks to the local media player using two system utilities:
//! - `pgrep` to find out whether the player process exists
//! - `osascript` to run AppleScript statements against the player
//!
//! Both run as child processes with a timeout so a hung script never stalls
//! the poll loop for longer than the configured limit.

mod command;
mod music;
mod probe;
mod script;

pub use command::{run_command, CommandError, CommandOutput};
pub use music::MusicAppBridge;
pub use probe::PgrepProbe;
pub use script::{OsaScript, Script, ScriptError};
