//! Outbound command vocabulary.
//!
//! Every command that reaches the request path goes through [`normalize`] first: whitespace is
//! removed, runs of `;` collapse to one and the command ends with exactly one `;`.

use std::fmt::Write;

pub const TERMINATOR: char = ';';

/// Request path prefix that the remote web interface serves commands under.
pub const DEFAULT_BASE_PATH: &str = "/_/";

pub fn normalize(command: &str) -> String {
    let mut normalized = String::with_capacity(command.len() + 1);
    for c in command.chars().filter(|c| !c.is_whitespace()) {
        if c == TERMINATOR && normalized.ends_with(TERMINATOR) {
            continue;
        }
        normalized.push(c);
    }
    if !normalized.is_empty() && !normalized.ends_with(TERMINATOR) {
        normalized.push(TERMINATOR);
    }
    normalized
}

/// True for commands that normalize to nothing worth sending.
pub fn is_blank(normalized: &str) -> bool {
    normalized.is_empty() || normalized == ";"
}

/// Builds the request path for a merged command string.
pub fn request_path(base_path: &str, commands: &str) -> String {
    format!("{}{}", base_path, commands)
}

/// One-shot actions identified by their numeric command code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Play,
    Pause,
    Stop,
    Record,
    StopRecordAndDiscard,
    Undo,
    Redo,
    ToggleMetronome,
    ToggleSnap,
    ToggleRepeat,
    PrevMarker,
    NextMarker,
    PrevClip,
    NextClip,
    ProjectStart,
    ProjectEnd,
    InsertMarker,
    AddTrack,
    ClearAllClip,
}

impl Action {
    pub fn code(self) -> u32 {
        match self {
            Action::Play => 1007,
            Action::Pause => 1008,
            Action::Stop => 40667,
            Action::Record => 1013,
            Action::StopRecordAndDiscard => 40668,
            Action::Undo => 40029,
            Action::Redo => 40030,
            Action::ToggleMetronome => 40364,
            Action::ToggleSnap => 1157,
            Action::ToggleRepeat => 1068,
            Action::PrevMarker => 40172,
            Action::NextMarker => 40173,
            Action::PrevClip => 40416,
            Action::NextClip => 40417,
            Action::ProjectStart => 40042,
            Action::ProjectEnd => 40043,
            Action::InsertMarker => 40157,
            Action::AddTrack => 40702,
            Action::ClearAllClip => 40527,
        }
    }

    pub fn command(self) -> String {
        format!("{};", self.code())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
    Toggle,
}

impl Toggle {
    pub fn value(self) -> i32 {
        match self {
            Toggle::On => 1,
            Toggle::Off => 0,
            Toggle::Toggle => -1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordMonitor {
    Auto,
    On,
    Off,
    Toggle,
}

impl RecordMonitor {
    pub fn value(self) -> i32 {
        match self {
            RecordMonitor::Auto => 2,
            RecordMonitor::On => 1,
            RecordMonitor::Off => 0,
            RecordMonitor::Toggle => -1,
        }
    }
}

/// ReaRoute inputs are addressed as hardware inputs offset by this amount.
pub const REAROUTE_INPUT_OFFSET: i32 = 512;

/// A track attribute that `SET/TRACK/<id>/...` can change.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackParam {
    Name(String),
    Volume(f64),
    Select(Toggle),
    Mute(Toggle),
    Solo(Toggle),
    RecordArm(Toggle),
    RecordMonitor(RecordMonitor),
    /// Hardware input id, negative disables the input.
    RecordInput(i32),
    /// ReaRoute channel, sent as a hardware input past [`REAROUTE_INPUT_OFFSET`].
    ReaRouteInput(i32),
    SendMute(usize, Toggle),
    SendVolume(usize, f64),
    Delete,
}

pub fn track_command(track: usize, param: &TrackParam) -> String {
    let mut command = format!("SET/TRACK/{}/", track);
    // Writing into a String cannot fail.
    let _ = match param {
        TrackParam::Name(name) => write!(command, "P_NAME/{}", encode_uri_component(name)),
        TrackParam::Volume(volume) => write!(command, "VOL/{}", volume),
        TrackParam::Select(state) => write!(command, "SEL/{}", state.value()),
        TrackParam::Mute(state) => write!(command, "MUTE/{}", state.value()),
        TrackParam::Solo(state) => write!(command, "SOLO/{}", state.value()),
        TrackParam::RecordArm(state) => write!(command, "RECARM/{}", state.value()),
        TrackParam::RecordMonitor(state) => write!(command, "RECMON/{}", state.value()),
        TrackParam::RecordInput(input) => write!(command, "I_RECINPUT/{}", input),
        TrackParam::ReaRouteInput(route) => {
            write!(command, "I_RECINPUT/{}", route + REAROUTE_INPUT_OFFSET)
        }
        TrackParam::SendMute(send, state) => {
            write!(command, "SEND/{}/MUTE/{}", send, state.value())
        }
        TrackParam::SendVolume(send, volume) => write!(command, "SEND/{}/VOL/{}", send, volume),
        TrackParam::Delete => write!(command, "DELETE_TRACK"),
    };
    command.push(TERMINATOR);
    command
}

/// Queries the value behind a numeric command code.
pub fn get(code: u32) -> String {
    format!("GET/{};", code)
}

/// Periodic query for one send of a track.
pub fn send_query(track: usize, send: usize) -> String {
    format!("GET/TRACK/{}/SEND/{};", track, send)
}

/// Moves the play cursor, `position` is any position string the remote side understands.
pub fn set_position(position: &str) -> String {
    format!("SET/POS_STR/{};", encode_uri_component(position))
}

pub fn osc(path: &str, value: Option<&str>) -> String {
    let mut command = format!("OSC/{}", path);
    if let Some(value) = value {
        command.push_str(&encode_uri_component(&format!(":{}", value)));
    }
    command.push(TERMINATOR);
    command
}

/// Percent-encodes everything outside of `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
pub fn encode_uri_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => {
                let _ = write!(encoded, "%{:02X}", byte);
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_and_terminates() {
        assert_eq!(normalize(" GET/40364 ;; GET/1157"), "GET/40364;GET/1157;");
        assert_eq!(normalize("TRACK"), "TRACK;");
        assert_eq!(normalize("TRACK;;;"), "TRACK;");
        assert_eq!(normalize("  \t "), "");
        assert!(is_blank(&normalize(";;")));
        assert!(!is_blank(&normalize("1007")));
    }

    #[test]
    fn track_commands() {
        assert_eq!(
            track_command(3, &TrackParam::Volume(0.5)),
            "SET/TRACK/3/VOL/0.5;"
        );
        assert_eq!(
            track_command(1, &TrackParam::Mute(Toggle::Toggle)),
            "SET/TRACK/1/MUTE/-1;"
        );
        assert_eq!(
            track_command(2, &TrackParam::SendMute(0, Toggle::On)),
            "SET/TRACK/2/SEND/0/MUTE/1;"
        );
        assert_eq!(
            track_command(2, &TrackParam::RecordMonitor(RecordMonitor::Auto)),
            "SET/TRACK/2/RECMON/2;"
        );
        assert_eq!(
            track_command(2, &TrackParam::RecordInput(-1)),
            "SET/TRACK/2/I_RECINPUT/-1;"
        );
        assert_eq!(
            track_command(2, &TrackParam::ReaRouteInput(3)),
            "SET/TRACK/2/I_RECINPUT/515;"
        );
        assert_eq!(
            track_command(4, &TrackParam::Name("Lead Vox".to_string())),
            "SET/TRACK/4/P_NAME/Lead%20Vox;"
        );
        assert_eq!(
            track_command(5, &TrackParam::Delete),
            "SET/TRACK/5/DELETE_TRACK;"
        );
    }

    #[test]
    fn encoded_commands() {
        assert_eq!(set_position("1:30.5"), "SET/POS_STR/1%3A30.5;");
        assert_eq!(osc("tempo/raw", Some("120")), "OSC/tempo/raw%3A120;");
        assert_eq!(osc("marker", None), "OSC/marker;");
        assert_eq!(encode_uri_component("a b/ü"), "a%20b%2F%C3%BC");
    }

    #[test]
    fn actions() {
        assert_eq!(Action::Play.command(), "1007;");
        assert_eq!(get(Action::ToggleMetronome.code()), "GET/40364;");
        assert_eq!(send_query(2, 1), "GET/TRACK/2/SEND/1;");
        assert_eq!(request_path(DEFAULT_BASE_PATH, "TRACK;"), "/_/TRACK;");
    }
}
