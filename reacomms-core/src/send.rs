use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, warn};
use reacomms_proto::format::{pan_to_string, send_muted, volume_to_string, Color};
use reacomms_proto::Command;

use crate::error::{Error, Result};
use crate::listeners::ListenerId;
use crate::track::{update, TrackInfo, TrackListeners};
use crate::TrackId;

const HARDWARE_OUTPUT_NAME: &str = "Hardware Out";

/// Where a send routes its signal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SendTarget {
    Track(TrackId),
    HardwareOutput,
}

impl SendTarget {
    /// Negative raw targets are hardware outputs.
    pub fn from_raw(raw: i64) -> SendTarget {
        match usize::try_from(raw) {
            Ok(track) => SendTarget::Track(track),
            Err(_) => SendTarget::HardwareOutput,
        }
    }
}

/// Name and color of a send target, kept in sync with the target track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetDisplay {
    pub name: String,
    pub color: Color,
}

impl TargetDisplay {
    pub fn of(track: &dyn TrackInfo) -> TargetDisplay {
        let name = if track.name().is_empty() {
            format!("Track {}", track.id())
        } else {
            track.name().to_string()
        };
        TargetDisplay {
            name,
            color: track.color(),
        }
    }

    pub fn hardware_output() -> TargetDisplay {
        TargetDisplay {
            name: HARDWARE_OUTPUT_NAME.to_string(),
            color: Color::Default,
        }
    }
}

impl Default for TargetDisplay {
    fn default() -> Self {
        TargetDisplay {
            name: String::new(),
            color: Color::Default,
        }
    }
}

/// Read access to a send.
pub trait SendInfo {
    fn track(&self) -> TrackId;
    fn index(&self) -> usize;
    fn muted(&self) -> bool;
    fn volume(&self) -> f64;
    fn pan(&self) -> f64;
    /// `None` until the first `SEND` row for this send arrives.
    fn target(&self) -> Option<SendTarget>;
    fn target_display(&self) -> TargetDisplay;

    fn volume_string(&self) -> String {
        volume_to_string(self.volume())
    }

    fn pan_string(&self) -> String {
        pan_to_string(self.pan())
    }
}

/// Values of one `SEND` row.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SendRow {
    pub track: TrackId,
    pub index: usize,
    pub muted: bool,
    pub volume: f64,
    pub pan: f64,
    pub target: SendTarget,
}

impl SendRow {
    pub fn parse(row: Command<'_>) -> Result<SendRow> {
        row.require(7)?;
        Ok(SendRow {
            track: row.index(1)?,
            index: row.index(2)?,
            muted: send_muted(row.integer(3)?),
            volume: row.number(4)?,
            pan: row.number(5)?,
            target: SendTarget::from_raw(row.integer(6)?),
        })
    }
}

/// The listener registry of a target track together with its current display values.
pub(crate) struct TargetHandle {
    pub listeners: Rc<RefCell<TrackListeners>>,
    pub display: TargetDisplay,
}

/// A listener registered on the target track. Cancelling is a no-op once the target is gone.
#[derive(Debug)]
struct Subscription {
    listeners: Weak<RefCell<TrackListeners>>,
    id: ListenerId,
}

impl Subscription {
    fn cancel(self) {
        let listeners = match self.listeners.upgrade() {
            Some(listeners) => listeners,
            None => return,
        };
        match listeners.try_borrow_mut() {
            Ok(mut listeners) => {
                listeners.unregister(self.id);
            }
            Err(_) => warn!("Could not unsubscribe {:?} from a busy track.", self.id),
        };
    }
}

pub(crate) struct TrackSend {
    track: TrackId,
    index: usize,
    synced: bool,
    muted: bool,
    volume: f64,
    pan: f64,
    target: Option<SendTarget>,
    display: Rc<RefCell<TargetDisplay>>,
    subscription: Option<Subscription>,
}

impl TrackSend {
    pub fn new(track: TrackId, index: usize) -> TrackSend {
        TrackSend {
            track,
            index,
            synced: false,
            muted: false,
            volume: 0.0,
            pan: 0.0,
            target: None,
            display: Rc::new(RefCell::new(TargetDisplay::default())),
            subscription: None,
        }
    }

    /// Drops the target subscription. The next `SEND` row after re-enabling resubscribes.
    pub fn disable(&mut self) {
        self.synced = false;
        self.target = None;
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    /// Applies a row. `target` must be provided when the row names a track other than the
    /// current target.
    pub fn apply(&mut self, row: &SendRow, target: Option<TargetHandle>) -> Result<bool> {
        let mut changed = !self.synced;
        self.synced = true;
        changed |= update(&mut self.muted, &row.muted);
        changed |= update(&mut self.volume, &row.volume);
        changed |= update(&mut self.pan, &row.pan);
        if self.target != Some(row.target) {
            self.retarget(row.target, target)?;
            changed = true;
        }
        Ok(changed)
    }

    pub fn needs_target(&self, target: SendTarget) -> bool {
        self.target != Some(target)
    }

    fn retarget(&mut self, target: SendTarget, handle: Option<TargetHandle>) -> Result<()> {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.target = None;
        match target {
            SendTarget::HardwareOutput => {
                *self.display.borrow_mut() = TargetDisplay::hardware_output();
            }
            SendTarget::Track(id) => {
                let handle = handle.ok_or(Error::UnknownTrack(id))?;
                let mut listeners = handle
                    .listeners
                    .try_borrow_mut()
                    .map_err(|_| Error::ListenerBusy)?;
                let display = self.display.clone();
                let listener = listeners.register(Box::new(move |track: &dyn TrackInfo| {
                    *display.borrow_mut() = TargetDisplay::of(track);
                }));
                *self.display.borrow_mut() = handle.display;
                self.subscription = Some(Subscription {
                    listeners: Rc::downgrade(&handle.listeners),
                    id: listener,
                });
            }
        }
        debug!(
            "Send {} of track {} now targets {:?}.",
            self.index, self.track, target
        );
        self.target = Some(target);
        Ok(())
    }

    pub fn view(&self) -> SendView<'_> {
        SendView { send: self }
    }
}

impl SendInfo for TrackSend {
    fn track(&self) -> TrackId {
        self.track
    }

    fn index(&self) -> usize {
        self.index
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn pan(&self) -> f64 {
        self.pan
    }

    fn target(&self) -> Option<SendTarget> {
        self.target
    }

    fn target_display(&self) -> TargetDisplay {
        self.display.borrow().clone()
    }
}

#[derive(Copy, Clone)]
pub struct SendView<'a> {
    send: &'a TrackSend,
}

impl SendInfo for SendView<'_> {
    fn track(&self) -> TrackId {
        self.send.track()
    }

    fn index(&self) -> usize {
        self.send.index()
    }

    fn muted(&self) -> bool {
        self.send.muted()
    }

    fn volume(&self) -> f64 {
        self.send.volume()
    }

    fn pan(&self) -> f64 {
        self.send.pan()
    }

    fn target(&self) -> Option<SendTarget> {
        self.send.target()
    }

    fn target_display(&self) -> TargetDisplay {
        self.send.target_display()
    }
}

impl std::fmt::Debug for SendView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SendView")
            .field("track", &self.track())
            .field("index", &self.index())
            .field("target", &self.target())
            .field("volume", &self.volume())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;
    use reacomms_proto::CommandBatch;

    fn row(raw: &str) -> SendRow {
        let mut batch = CommandBatch::new();
        batch.parse(raw);
        SendRow::parse(batch.command(0).unwrap()).unwrap()
    }

    fn handle(track: &Track) -> TargetHandle {
        TargetHandle {
            listeners: track.listeners().clone(),
            display: TargetDisplay::of(track),
        }
    }

    #[test]
    fn parses_send_row() {
        let row = row("SEND\t1\t0\t8\t0.5\t-1\t-1\n");
        assert_eq!(row.track, 1);
        assert!(row.muted);
        assert_eq!(row.target, SendTarget::HardwareOutput);
    }

    #[test]
    fn mirrors_target_track() {
        let first = Track::new(2);
        let second = Track::new(5);
        let mut send = TrackSend::new(1, 0);

        assert!(send
            .apply(&row("SEND\t1\t0\t0\t1\t0\t2\n"), Some(handle(&first)))
            .unwrap());
        assert_eq!(send.target_display().name, "Track 2");
        assert_eq!(first.view().listener_count(), 1);

        first.notify();
        assert_eq!(send.target_display().name, "Track 2");

        // Same target, no resubscription.
        assert!(!send.apply(&row("SEND\t1\t0\t0\t1\t0\t2\n"), None).unwrap());
        assert_eq!(first.view().listener_count(), 1);

        assert!(send
            .apply(&row("SEND\t1\t0\t0\t1\t0\t5\n"), Some(handle(&second)))
            .unwrap());
        assert_eq!(first.view().listener_count(), 0);
        assert_eq!(second.view().listener_count(), 1);

        send.apply(&row("SEND\t1\t0\t0\t1\t0\t-1\n"), None).unwrap();
        assert_eq!(second.view().listener_count(), 0);
        assert_eq!(send.target_display().name, "Hardware Out");
        assert_eq!(send.target_display().color.to_string(), "#9DA5A5");
    }

    #[test]
    fn disable_drops_subscription() {
        let target = Track::new(2);
        let mut send = TrackSend::new(1, 0);
        send.apply(&row("SEND\t1\t0\t0\t1\t0\t2\n"), Some(handle(&target)))
            .unwrap();
        send.disable();
        assert_eq!(target.view().listener_count(), 0);
        assert_eq!(send.target(), None);
        assert!(send.needs_target(SendTarget::Track(2)));
    }

    #[test]
    fn missing_target_is_reported() {
        let mut send = TrackSend::new(1, 0);
        assert!(matches!(
            send.apply(&row("SEND\t1\t0\t0\t1\t0\t9\n"), None),
            Err(Error::UnknownTrack(9))
        ));
        assert_eq!(send.target(), None);
    }
}
