//! Text protocol spoken by the remote web control interface.
//!
//! Requests are `GET <base path><commands>` where commands are `;`-terminated. Responses are
//! line-feed separated rows of tab separated fields, the first field naming the row.

pub mod batch;
pub mod command;
pub mod error;
pub mod format;

pub use batch::{Command, CommandBatch, ImmutableCommandBatch};
pub use error::{Error, Result};

/// Row discriminators.
pub mod tag {
    pub const TRACK: &str = "TRACK";
    pub const SEND: &str = "SEND";
    pub const BEATPOS: &str = "BEATPOS";
    pub const TRANSPORT: &str = "TRANSPORT";
    pub const CMDSTATE: &str = "CMDSTATE";
}
