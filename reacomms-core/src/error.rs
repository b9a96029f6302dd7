use thiserror::Error;

use crate::TrackId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("construction failed: {0}")]
    Construction(String),
    #[error("invalid value: {0}")]
    Validation(String),
    #[error(transparent)]
    Protocol(#[from] reacomms_proto::Error),
    #[error("track {0} not found")]
    UnknownTrack(TrackId),
    #[error("send {send} of track {track} not found")]
    UnknownSend { track: TrackId, send: usize },
    #[error("listeners are being notified")]
    ListenerBusy,
    #[error("transport failed: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
