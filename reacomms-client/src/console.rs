use std::io::BufRead;

use log::{info, warn};
use reacomms_proto::command::{
    normalize, osc, set_position, track_command, Action, Toggle, TrackParam,
};
use ringbuf::Producer;

const HELP: &str = "commands: play pause stop record undo redo metronome snap repeat start end \
                    marker add clear | mute N | solo N | arm N | select N | vol N V | name N TEXT \
                    | input N IN | rearoute N ROUTE | delete N | goto POS | tempo BPM \
                    | raw COMMAND";

/// Turns one line of console input into a protocol command.
pub fn parse(line: &str) -> Result<String, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| HELP.to_string())?;
    let args: Vec<&str> = words.collect();
    let command = match (verb, args.as_slice()) {
        ("play", []) => Action::Play.command(),
        ("pause", []) => Action::Pause.command(),
        ("stop", []) => Action::Stop.command(),
        ("record", []) => Action::Record.command(),
        ("undo", []) => Action::Undo.command(),
        ("redo", []) => Action::Redo.command(),
        ("metronome", []) => Action::ToggleMetronome.command(),
        ("snap", []) => Action::ToggleSnap.command(),
        ("repeat", []) => Action::ToggleRepeat.command(),
        ("start", []) => Action::ProjectStart.command(),
        ("end", []) => Action::ProjectEnd.command(),
        ("marker", []) => Action::InsertMarker.command(),
        ("add", []) => Action::AddTrack.command(),
        ("clear", []) => Action::ClearAllClip.command(),
        ("mute", [track]) => track_command(number(track)?, &TrackParam::Mute(Toggle::Toggle)),
        ("solo", [track]) => track_command(number(track)?, &TrackParam::Solo(Toggle::Toggle)),
        ("arm", [track]) => track_command(number(track)?, &TrackParam::RecordArm(Toggle::Toggle)),
        ("select", [track]) => track_command(number(track)?, &TrackParam::Select(Toggle::On)),
        ("vol", [track, volume]) => {
            let volume = volume
                .parse::<f64>()
                .map_err(|_| format!("{:?} is not a volume", volume))?;
            track_command(number(track)?, &TrackParam::Volume(volume))
        }
        ("name", [track, name @ ..]) if !name.is_empty() => {
            track_command(number(track)?, &TrackParam::Name(name.join(" ")))
        }
        ("input", [track, input]) => {
            let input = input
                .parse::<i32>()
                .map_err(|_| format!("{:?} is not an input", input))?;
            track_command(number(track)?, &TrackParam::RecordInput(input))
        }
        ("rearoute", [track, route]) => match route.parse::<i32>() {
            Ok(route) if route >= 0 => {
                track_command(number(track)?, &TrackParam::ReaRouteInput(route))
            }
            _ => return Err(format!("{:?} is not a ReaRoute channel", route)),
        },
        ("delete", [track]) => track_command(number(track)?, &TrackParam::Delete),
        ("goto", [position]) => set_position(position),
        ("tempo", [bpm]) => match bpm.parse::<f64>() {
            Ok(bpm) if bpm.is_finite() && bpm > 0.0 => osc("tempo/raw", Some(&bpm.to_string())),
            _ => return Err(format!("{:?} is not a tempo", bpm)),
        },
        ("raw", [command]) => normalize(command),
        _ => return Err(HELP.to_string()),
    };
    Ok(command)
}

fn number(word: &str) -> Result<usize, String> {
    word.parse::<usize>()
        .map_err(|_| format!("{:?} is not a track number", word))
}

/// Reads commands from stdin until it closes.
pub fn spawn(mut command_queue: Producer<String>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        info!("Reading commands from stdin. {}", HELP);
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("Could not read stdin: {}", err);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse(&line) {
                Ok(command) => {
                    if command_queue.push(command).is_err() {
                        warn!("Command queue is full, dropping {:?}.", line);
                    }
                }
                Err(message) => warn!("{}", message),
            }
        }
        info!("stdin closed, no more commands.");
    })
}
