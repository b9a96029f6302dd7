use std::fmt::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, warn};
use reacomms_proto::command::{Action, TERMINATOR};

const PEAK_SILENT: i64 = -1500;
const BEATS_PER_MEASURE: f64 = 4.0;

/// A session that lives in the process and answers requests like the remote side would.
#[derive(Clone, Debug)]
pub struct DummyBackend {
    session: Arc<Mutex<Session>>,
}

impl DummyBackend {
    pub fn new() -> DummyBackend {
        DummyBackend {
            session: Arc::new(Mutex::new(Session::demo())),
        }
    }

    /// Runs every command in `commands` and returns the rows they produced.
    pub fn fetch(&self, commands: &str) -> String {
        let mut session = match self.session.lock() {
            Ok(session) => session,
            Err(poisoned) => poisoned.into_inner(),
        };
        session.advance(Instant::now());
        let mut response = String::new();
        for command in commands.split(TERMINATOR).filter(|c| !c.is_empty()) {
            session.execute(command, &mut response);
        }
        response
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq)]
struct DummySend {
    /// Negative for the hardware output.
    target: i64,
    volume: f64,
    muted: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct DummyTrack {
    name: String,
    volume: f64,
    pan: f64,
    muted: bool,
    soloed: bool,
    armed: bool,
    selected: bool,
    color: u32,
    sends: Vec<DummySend>,
}

impl DummyTrack {
    fn new(name: &str, color: u32) -> DummyTrack {
        DummyTrack {
            name: name.to_string(),
            volume: 1.0,
            pan: 0.0,
            muted: false,
            soloed: false,
            armed: false,
            selected: false,
            color,
            sends: Vec::new(),
        }
    }

    fn flags(&self) -> i64 {
        let mut flags = 0;
        if self.muted {
            flags |= 8;
        }
        if self.soloed {
            flags |= 16;
        }
        if self.armed {
            flags |= 64;
        }
        flags
    }
}

#[derive(Debug)]
struct Session {
    tracks: Vec<DummyTrack>,
    play_state: i64,
    position: f64,
    repeat: bool,
    metronome: bool,
    snap: bool,
    tempo: f64,
    last_advance: Option<Instant>,
}

impl Session {
    fn demo() -> Session {
        let mut drums = DummyTrack::new("Drums", 0xC04040);
        drums.sends.push(DummySend {
            target: -1,
            volume: 1.0,
            muted: false,
        });
        let mut vox = DummyTrack::new("Vox", 0x40A0C0);
        vox.sends.push(DummySend {
            target: 4,
            volume: 0.5,
            muted: false,
        });
        Session {
            tracks: vec![
                DummyTrack::new("MASTER", 0),
                drums,
                DummyTrack::new("Bass", 0x40C040),
                vox,
                DummyTrack::new("Reverb", 0),
            ],
            play_state: 0,
            position: 0.0,
            repeat: false,
            metronome: false,
            snap: true,
            tempo: 120.0,
            last_advance: None,
        }
    }

    fn advance(&mut self, now: Instant) {
        if let Some(last) = self.last_advance {
            if self.play_state == 1 || self.play_state == 5 {
                self.position += now.duration_since(last).as_secs_f64();
            }
        }
        self.last_advance = Some(now);
    }

    fn execute(&mut self, command: &str, out: &mut String) {
        let parts: Vec<&str> = command.split('/').collect();
        let handled = match parts.as_slice() {
            ["TRACK"] => {
                self.write_tracks(out);
                true
            }
            ["BEATPOS"] => {
                self.write_beat_position(out);
                true
            }
            ["TRANSPORT"] => {
                self.write_transport(out);
                true
            }
            ["GET", "TRACK", track, "SEND", send] => self.write_send(track, send, out),
            ["GET", code] => self.write_command_state(code, out),
            ["SET", "TRACK", track, rest @ ..] => self.set_track(track, rest),
            ["SET", "POS_STR", position] => match position.parse::<f64>() {
                Ok(position) => {
                    self.position = position.max(0.0);
                    true
                }
                Err(_) => false,
            },
            ["OSC", "tempo", value] => match value.strip_prefix("raw%3A").map(str::parse::<f64>) {
                Some(Ok(tempo)) if tempo > 0.0 => {
                    self.tempo = tempo;
                    true
                }
                _ => false,
            },
            [code] => match code.parse::<u32>() {
                Ok(code) => self.run_action(code),
                Err(_) => false,
            },
            _ => false,
        };
        if !handled {
            warn!("Dummy session ignores {:?}.", command);
        }
    }

    fn run_action(&mut self, code: u32) -> bool {
        const ACTIONS: [Action; 10] = [
            Action::Play,
            Action::Pause,
            Action::Stop,
            Action::Record,
            Action::ToggleMetronome,
            Action::ToggleSnap,
            Action::ToggleRepeat,
            Action::ProjectStart,
            Action::AddTrack,
            Action::ClearAllClip,
        ];
        let action = match ACTIONS.iter().find(|a| a.code() == code) {
            Some(action) => *action,
            None => return false,
        };
        debug!("Dummy session runs {:?}.", action);
        match action {
            Action::Play => self.play_state = 1,
            Action::Pause => {
                self.play_state = match self.play_state {
                    1 => 2,
                    2 => 1,
                    5 => 6,
                    6 => 5,
                    other => other,
                }
            }
            Action::Stop => self.play_state = 0,
            Action::Record => self.play_state = 5,
            Action::ToggleMetronome => self.metronome = !self.metronome,
            Action::ToggleSnap => self.snap = !self.snap,
            Action::ToggleRepeat => self.repeat = !self.repeat,
            Action::ProjectStart => self.position = 0.0,
            Action::AddTrack => self.tracks.push(DummyTrack::new("", 0)),
            _ => {}
        }
        true
    }

    fn set_track(&mut self, track: &str, rest: &[&str]) -> bool {
        let id = match track.parse::<usize>() {
            Ok(id) if id < self.tracks.len() => id,
            _ => return false,
        };
        if rest == ["DELETE_TRACK"] {
            return self.delete_track(id);
        }
        let track = &mut self.tracks[id];
        match rest {
            ["P_NAME", name] => track.name = decode(name),
            ["VOL", volume] => match volume.parse::<f64>() {
                Ok(volume) => track.volume = volume.max(0.0),
                Err(_) => return false,
            },
            ["MUTE", value] => track.muted = toggle(track.muted, value),
            ["SOLO", value] => track.soloed = toggle(track.soloed, value),
            ["RECARM", value] => track.armed = toggle(track.armed, value),
            ["SEL", value] => track.selected = toggle(track.selected, value),
            ["RECMON", _] | ["I_RECINPUT", _] => {}
            ["SEND", send, param, value] => {
                let send = match send.parse::<usize>().ok().and_then(|s| track.sends.get_mut(s)) {
                    Some(send) => send,
                    None => return false,
                };
                match *param {
                    "MUTE" => send.muted = toggle(send.muted, value),
                    "VOL" => match value.parse::<f64>() {
                        Ok(volume) => send.volume = volume.max(0.0),
                        Err(_) => return false,
                    },
                    _ => return false,
                }
            }
            _ => return false,
        }
        true
    }

    fn delete_track(&mut self, id: usize) -> bool {
        if id == 0 {
            return false;
        }
        self.tracks.remove(id);
        let removed = id as i64;
        for track in self.tracks.iter_mut() {
            track.sends.retain(|s| s.target != removed);
            for send in track.sends.iter_mut() {
                if send.target > removed {
                    send.target -= 1;
                }
            }
        }
        true
    }

    fn write_tracks(&self, out: &mut String) {
        for (id, track) in self.tracks.iter().enumerate() {
            let hardware = track.sends.iter().filter(|s| s.target < 0).count();
            let sends = track.sends.len() - hardware;
            let receives = self
                .tracks
                .iter()
                .flat_map(|t| t.sends.iter())
                .filter(|s| s.target == id as i64)
                .count();
            let _ = writeln!(
                out,
                "TRACK\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t1\t0\t{}\t{}\t{}\t{}",
                id,
                track.name,
                track.flags(),
                track.volume,
                track.pan,
                PEAK_SILENT,
                PEAK_SILENT,
                sends,
                receives,
                hardware,
                track.color
            );
        }
    }

    fn write_send(&self, track: &str, send: &str, out: &mut String) -> bool {
        let found = track.parse::<usize>().ok().and_then(|t| {
            let send = send.parse::<usize>().ok()?;
            self.tracks.get(t)?.sends.get(send).map(|s| (t, send, s))
        });
        let (track, index, send) = match found {
            Some(found) => found,
            None => return false,
        };
        let flags = if send.muted { 8 } else { 0 };
        let _ = writeln!(
            out,
            "SEND\t{}\t{}\t{}\t{}\t0\t{}",
            track, index, flags, send.volume, send.target
        );
        true
    }

    fn write_command_state(&self, code: &str, out: &mut String) -> bool {
        let code = match code.parse::<u32>() {
            Ok(code) => code,
            Err(_) => return false,
        };
        let state = if code == Action::ToggleMetronome.code() {
            self.metronome as i64
        } else if code == Action::ToggleSnap.code() {
            self.snap as i64
        } else if code == Action::ToggleRepeat.code() {
            self.repeat as i64
        } else {
            -1
        };
        let _ = writeln!(out, "CMDSTATE\t{}\t{}", code, state);
        true
    }

    fn beats(&self) -> f64 {
        self.position * self.tempo / 60.0
    }

    fn write_beat_position(&self, out: &mut String) {
        let beats = self.beats();
        let _ = writeln!(
            out,
            "BEATPOS\t{}\t{:.6}\t{:.6}\t{}\t{:.6}\t4\t4",
            self.play_state,
            self.position,
            beats,
            (beats / BEATS_PER_MEASURE).floor(),
            beats % BEATS_PER_MEASURE
        );
    }

    fn write_transport(&self, out: &mut String) {
        let beats = self.beats();
        let measure = (beats / BEATS_PER_MEASURE).floor() + 1.0;
        let beat = (beats % BEATS_PER_MEASURE).floor() + 1.0;
        let _ = writeln!(
            out,
            "TRANSPORT\t{}\t{:.6}\t{}\t{:.3}\t{}.{}.00",
            self.play_state, self.position, self.repeat as i64, self.position, measure, beat
        );
    }
}

/// Undoes the percent-encoding of names, invalid escapes are kept as they are.
fn decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = bytes
            .get(i + 1..i + 3)
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match (bytes[i], escaped) {
            (b'%', Some(byte)) => {
                decoded.push(byte);
                i += 3;
            }
            (byte, _) => {
                decoded.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn toggle(current: bool, value: &str) -> bool {
    match value {
        "1" => true,
        "0" => false,
        "-1" => !current,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_tracks() {
        let backend = DummyBackend::new();
        let response = backend.fetch("TRACK;");
        let rows: Vec<&str> = response.lines().collect();
        assert_eq!(rows.len(), 5);
        assert!(rows[0].starts_with("TRACK\t0\tMASTER\t"));
        // Vox sends to Reverb, Reverb receives from Vox.
        assert!(rows[3].ends_with("\t1\t0\t0\t4235456"));
        assert!(rows[4].ends_with("\t0\t1\t0\t0"));
        assert_eq!(rows[1].split('\t').count(), 14);
    }

    #[test]
    fn applies_track_commands() {
        let backend = DummyBackend::new();
        let response = backend.fetch("SET/TRACK/2/MUTE/-1;SET/TRACK/2/RECARM/1;TRACK;");
        let bass = response.lines().nth(2).unwrap();
        assert!(bass.starts_with("TRACK\t2\tBass\t72\t"));

        let response = backend.fetch("SET/TRACK/3/SEND/0/MUTE/1;GET/TRACK/3/SEND/0;");
        assert_eq!(response, "SEND\t3\t0\t8\t0.5\t0\t4\n");
    }

    #[test]
    fn delete_retargets_sends() {
        let backend = DummyBackend::new();
        backend.fetch("SET/TRACK/2/DELETE_TRACK;");
        assert_eq!(
            backend.fetch("GET/TRACK/2/SEND/0;"),
            "SEND\t2\t0\t0\t0.5\t0\t3\n"
        );
        assert_eq!(backend.fetch("TRACK;").lines().count(), 4);
    }

    #[test]
    fn transport_and_toggles() {
        let backend = DummyBackend::new();
        let response = backend.fetch("1007;40364;TRANSPORT;GET/40364;GET/1157;");
        let rows: Vec<&str> = response.lines().collect();
        assert!(rows[0].starts_with("TRANSPORT\t1\t"));
        assert_eq!(rows[1], "CMDSTATE\t40364\t1");
        assert_eq!(rows[2], "CMDSTATE\t1157\t1");

        let response = backend.fetch("40667;SET/POS_STR/8;BEATPOS;");
        assert_eq!(
            response,
            "BEATPOS\t0\t8.000000\t16.000000\t4\t0.000000\t4\t4\n"
        );
    }

    #[test]
    fn renames_tracks() {
        let backend = DummyBackend::new();
        let response = backend.fetch("SET/TRACK/2/P_NAME/Lead%20Bass%2;TRACK;");
        assert!(response.lines().nth(2).unwrap().starts_with("TRACK\t2\tLead Bass%2\t"));
    }

    #[test]
    fn ignores_unknown_commands() {
        let backend = DummyBackend::new();
        assert_eq!(backend.fetch("NOPE;SET/TRACK/99/MUTE/1;"), "");
    }
}
