//! State mirror of a remote session.
//!
//! [`Comms`] owns the outbound request queue and every mirrored entity. Responses are parsed
//! into a batch once and then handed to the track manager, the timekeeper, the command states
//! and finally to batch listeners. Everything outside only gets read views.

pub mod arena;
pub mod command_state;
pub mod comms;
pub mod config;
pub mod error;
pub mod listeners;
pub mod rec_arm;
pub mod recurring;
pub mod send;
pub mod timekeeper;
pub mod track;
pub mod tracks;
pub mod transport;

pub type TrackId = usize;

pub use command_state::{CommandState, CommandStates};
pub use comms::Comms;
pub use config::Config;
pub use error::{Error, Result};
pub use listeners::ListenerId;
pub use rec_arm::RecArmCounter;
pub use send::{SendInfo, SendTarget, SendView, TargetDisplay};
pub use timekeeper::{PlayState, TimeSignature, Timekeeper};
pub use track::{TrackInfo, TrackView};
pub use tracks::TrackManager;
pub use transport::{PollRequest, State};
