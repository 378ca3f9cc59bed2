//! Interactive F# console and one-shot `dotnet` terminals.
//!
//! [`ConsoleManager`] keeps at most one interactive console alive and feeds
//! it source text. Where the console actually runs is up to the
//! [`TerminalHost`]; [`ProcessTerminalHost`] runs it as a child process on
//! the current terminal.

mod host;
mod manager;
mod types;

pub use host::{OpenedTerminal, ProcessTerminalHost, Terminal, TerminalHost};
pub use manager::{ConsoleManager, STATEMENT_TERMINATOR};
pub use types::{ConsoleError, ConsoleExit, ConsoleExitReason, ConsoleHandle, ConsoleSpec};
