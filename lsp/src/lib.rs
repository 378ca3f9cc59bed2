//! Language server process supervision.
//!
//! The server speaks JSON-RPC over stdio ([`codec`]). [`Supervisor`] owns the
//! child process, [`NotificationRouter`] demultiplexes what it reports, and
//! [`ProgressListener`] turns its scan-progress notifications into a status
//! indicator.

pub mod codec;
pub mod progress;
pub mod types;

pub(crate) mod protocol;
pub(crate) mod server;

mod router;
mod supervisor;

pub use progress::{ProgressListener, StartProgress, StatusBar, StatusItem};
pub use router::{NotificationHandler, NotificationRouter};
pub use supervisor::Supervisor;
pub use types::{DEBUG_ATTACH_ARG, ServerEvent, ServerSpec, ServerStopReason, SupervisorError};
