//! Wiring shared by the `fsls` binary and its integration tests.

pub mod activation;
pub mod repl;
pub mod status;

pub use activation::{Activation, Session};
pub use status::StderrStatusBar;
