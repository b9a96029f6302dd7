use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use reacomms_core::{Comms, Config, SendInfo, SendTarget, State, TrackInfo};
use ringbuf::RingBuffer;

fn comms() -> Comms {
    let (_, consumer) = RingBuffer::<String>::new(4).split();
    let mut comms =
        Comms::new(Config::with_min_update(Duration::from_millis(10)), consumer).unwrap();
    comms.start();
    comms
}

fn track(id: usize, name: &str, volume: f64, sends: usize) -> String {
    format!(
        "TRACK\t{}\t{}\t0\t{}\t0\t-150\t-150\t1\t0\t{}\t0\t0\t0\n",
        id, name, volume, sends
    )
}

fn tracks(count: usize) -> String {
    (0..count).map(|id| track(id, "", 1.0, 0)).collect()
}

#[test]
fn high_water_mark() {
    let mut comms = comms();
    comms.on_response(Ok(tracks(2)));
    comms.on_response(Ok(tracks(5)));
    comms.on_response(Ok(tracks(2)));

    let manager = comms.tracks();
    assert_eq!(manager.len(), 5);
    assert_eq!(manager.active_count(), 2);
    assert!(manager.track(3).unwrap().hidden());
    assert!(manager.track(4).unwrap().hidden());

    comms.on_response(Ok(tracks(5)));
    let manager = comms.tracks();
    assert_eq!(manager.len(), 5);
    assert_eq!(manager.active_count(), 5);
    assert!(manager.iter().all(|t| !t.hidden()));
}

#[test]
fn zero_track_batch_changes_nothing() {
    let mut comms = comms();
    comms.on_response(Ok(tracks(3)));
    let calls = Rc::new(RefCell::new(0));
    let sink = calls.clone();
    comms
        .tracks_mut()
        .register_listener(move |_| *sink.borrow_mut() += 1);

    comms.on_response(Ok("TRANSPORT\t0\t0\t0\t0.000\t1.1.00\n".to_string()));
    comms.on_response(Ok(String::new()));
    assert_eq!(comms.tracks().active_count(), 3);
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn send_retargets_once() {
    let mut comms = comms();
    let layout = format!(
        "{}{}{}{}",
        track(0, "", 1.0, 0),
        track(1, "Vox", 1.0, 1),
        track(2, "Verb", 1.0, 0),
        track(3, "Delay", 1.0, 0)
    );
    comms.on_response(Ok(format!("{}SEND\t1\t0\t0\t0.5\t0\t2\n", layout)));
    let listeners = |comms: &Comms, id: usize| comms.tracks().track(id).unwrap().listener_count();
    assert_eq!(listeners(&comms, 2), 1);
    assert_eq!(listeners(&comms, 3), 0);

    // Repeating the same target keeps the single subscription.
    comms.on_response(Ok(format!("{}SEND\t1\t0\t0\t0.5\t0\t2\n", layout)));
    assert_eq!(listeners(&comms, 2), 1);

    comms.on_response(Ok(format!("{}SEND\t1\t0\t0\t0.5\t0\t3\n", layout)));
    assert_eq!(listeners(&comms, 2), 0);
    assert_eq!(listeners(&comms, 3), 1);

    let tracks = comms.tracks();
    let send = tracks.track(1).unwrap().send(0).unwrap();
    assert_eq!(send.target(), Some(SendTarget::Track(3)));
    assert_eq!(send.target_display().name, "Delay");
}

#[test]
fn send_queries_follow_send_count() {
    let mut comms = comms();
    comms.on_response(Ok(format!("{}{}", track(0, "", 1.0, 0), track(1, "Vox", 1.0, 2))));
    let queries = |comms: &Comms| {
        comms
            .transport()
            .recurring()
            .iter()
            .map(|r| r.command().matches("/SEND/").count())
            .sum::<usize>()
    };
    assert_eq!(queries(&comms), 2);

    comms.on_response(Ok(format!("{}{}", track(0, "", 1.0, 0), track(1, "Vox", 1.0, 1))));
    assert_eq!(queries(&comms), 1);

    comms.on_response(Ok(tracks(1)));
    assert_eq!(queries(&comms), 0);
}

#[test]
fn single_flight() {
    let mut comms = comms();
    let now = Instant::now();
    assert!(comms.tick(now).is_some());
    assert_eq!(comms.state(), State::InFlight);
    assert!(comms.tick(now + Duration::from_secs(1)).is_none());

    comms.on_response(Ok(String::new()));
    assert_eq!(comms.state(), State::Idle);
    assert!(comms.tick(now + Duration::from_secs(1)).is_some());
}

#[test]
fn display_values() {
    let mut comms = comms();
    let raw = format!(
        "{}{}",
        track(0, "", 1.0, 0),
        track(1, "Quiet", 0.000_000_01, 0)
    );
    comms.on_response(Ok(raw));
    let tracks = comms.tracks();
    let master = tracks.track(0).unwrap();
    assert!(master.is_master());
    assert_eq!(master.volume_string(), "0.00 dB");
    assert_eq!(master.pan_string(), "center");
    assert_eq!(tracks.track(1).unwrap().volume_string(), "-inf dB");
    assert_eq!(master.color().to_string(), "#9DA5A5");
}
