use std::cell::RefCell;
use std::rc::Rc;

use log::warn;
use reacomms_proto::command::send_query;
use reacomms_proto::format::{pan_to_string, volume_to_string, Color, TrackFlags};
use reacomms_proto::Command;

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::listeners::{ListenerId, Listeners};
use crate::send::{SendView, TrackSend};
use crate::transport::Transport;
use crate::TrackId;

pub type TrackHandler = dyn FnMut(&dyn TrackInfo);
pub(crate) type TrackListeners = Listeners<TrackHandler>;

pub const MASTER_TRACK: TrackId = 0;

/// Read access to a track.
pub trait TrackInfo {
    fn id(&self) -> TrackId;
    fn name(&self) -> &str;
    /// Raw volume, `1.0` is 0 dB.
    fn volume(&self) -> f64;
    fn pan(&self) -> f64;
    fn muted(&self) -> bool;
    fn soloed(&self) -> bool;
    fn record_armed(&self) -> bool;
    fn is_folder(&self) -> bool;
    fn color(&self) -> Color;
    /// Hidden tracks no longer exist on the remote side but keep their slot.
    fn hidden(&self) -> bool;
    /// Ordinary sends plus hardware outputs.
    fn send_count(&self) -> usize;
    fn hardware_output_count(&self) -> usize;
    fn receive_count(&self) -> usize;
    /// Latched once the meter peaks at or above 0 dB.
    fn clipped(&self) -> bool;

    fn is_master(&self) -> bool {
        self.id() == MASTER_TRACK
    }

    fn volume_string(&self) -> String {
        volume_to_string(self.volume())
    }

    fn pan_string(&self) -> String {
        pan_to_string(self.pan())
    }
}

/// Values of one `TRACK` row.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TrackRow {
    pub id: TrackId,
    pub name: String,
    pub flags: TrackFlags,
    pub volume: f64,
    pub pan: f64,
    /// Last meter peak in tenths of a dB.
    pub peak: f64,
    pub send_count: usize,
    pub receive_count: usize,
    pub hardware_output_count: usize,
    pub color: Color,
}

impl TrackRow {
    pub fn parse(row: Command<'_>) -> Result<TrackRow> {
        // The trailing color field is optional.
        row.require(13)?;
        Ok(TrackRow {
            id: row.index(1)?,
            name: row.field(2)?.to_string(),
            flags: TrackFlags::from_bits(row.integer(3)?),
            volume: row.number(4)?,
            pan: row.number(5)?,
            peak: row.number(6)?,
            send_count: row.index(10)?,
            receive_count: row.index(11)?,
            hardware_output_count: row.index(12)?,
            color: Color::from_field(row.get(13)),
        })
    }
}

pub(crate) struct Track {
    id: TrackId,
    synced: bool,
    hidden: bool,
    name: String,
    flags: TrackFlags,
    volume: f64,
    pan: f64,
    color: Color,
    send_count: usize,
    hardware_output_count: usize,
    receive_count: usize,
    clipped: bool,
    sends: Arena<TrackSend>,
    listeners: Rc<RefCell<TrackListeners>>,
}

impl Track {
    pub fn new(id: TrackId) -> Track {
        Track {
            id,
            synced: false,
            hidden: false,
            name: String::new(),
            flags: TrackFlags::default(),
            volume: 0.0,
            pan: 0.0,
            color: Color::Default,
            send_count: 0,
            hardware_output_count: 0,
            receive_count: 0,
            clipped: false,
            sends: Arena::new(),
            listeners: Rc::new(RefCell::new(Listeners::new())),
        }
    }

    /// Applies a row field by field. Returns true if anything observable changed.
    pub fn apply(&mut self, row: &TrackRow, transport: &mut Transport) -> bool {
        let mut changed = !self.synced;
        self.synced = true;
        changed |= update(&mut self.name, &row.name);
        changed |= update(&mut self.flags, &row.flags);
        changed |= update(&mut self.volume, &row.volume);
        changed |= update(&mut self.pan, &row.pan);
        changed |= update(&mut self.color, &row.color);
        changed |= update(&mut self.send_count, &row.send_count);
        changed |= update(&mut self.hardware_output_count, &row.hardware_output_count);
        changed |= update(&mut self.receive_count, &row.receive_count);
        if !self.clipped && row.peak >= 0.0 {
            self.clipped = true;
            changed = true;
        }
        let sends = row.send_count + row.hardware_output_count;
        changed |= self.reconcile_sends(sends, transport);
        changed
    }

    pub fn enable(&mut self) -> bool {
        let changed = self.hidden;
        self.hidden = false;
        changed
    }

    pub fn disable(&mut self, transport: &mut Transport) -> bool {
        let mut changed = !self.hidden;
        self.hidden = true;
        changed |= update(&mut self.flags.record_armed, &false);
        changed |= self.reconcile_sends(0, transport);
        changed
    }

    pub fn clear_clip(&mut self) -> bool {
        std::mem::replace(&mut self.clipped, false)
    }

    fn reconcile_sends(&mut self, count: usize, transport: &mut Transport) -> bool {
        let id = self.id;
        let resize = self
            .sends
            .resize_with(count, |index| TrackSend::new(id, index));
        for &index in resize.enabled.iter() {
            transport.register_recurring(&send_query(id, index), None);
        }
        for &index in resize.disabled.iter() {
            if let Some(send) = self.sends.get_mut(index) {
                send.disable();
            }
            transport.cancel_recurring(&send_query(id, index));
        }
        !resize.is_unchanged()
    }

    pub fn send_mut(&mut self, index: usize) -> Result<&mut TrackSend> {
        if !self.sends.is_active(index) {
            return Err(Error::UnknownSend {
                track: self.id,
                send: index,
            });
        }
        self.sends.get_mut(index).ok_or(Error::UnknownSend {
            track: self.id,
            send: index,
        })
    }

    pub fn send(&self, index: usize) -> Option<&TrackSend> {
        if self.sends.is_active(index) {
            self.sends.get(index)
        } else {
            None
        }
    }

    pub fn listeners(&self) -> &Rc<RefCell<TrackListeners>> {
        &self.listeners
    }

    pub fn notify(&self) {
        match self.listeners.try_borrow_mut() {
            Ok(mut listeners) => listeners.notify_with(|handler| handler(self)),
            Err(_) => warn!("Track {} is already notifying its listeners.", self.id),
        }
    }

    pub fn view(&self) -> TrackView<'_> {
        TrackView { track: self }
    }
}

impl TrackInfo for Track {
    fn id(&self) -> TrackId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn pan(&self) -> f64 {
        self.pan
    }

    fn muted(&self) -> bool {
        self.flags.muted
    }

    fn soloed(&self) -> bool {
        self.flags.soloed
    }

    fn record_armed(&self) -> bool {
        self.flags.record_armed
    }

    fn is_folder(&self) -> bool {
        self.flags.folder
    }

    fn color(&self) -> Color {
        self.color
    }

    fn hidden(&self) -> bool {
        self.hidden
    }

    fn send_count(&self) -> usize {
        self.sends.active_len()
    }

    fn hardware_output_count(&self) -> usize {
        self.hardware_output_count
    }

    fn receive_count(&self) -> usize {
        self.receive_count
    }

    fn clipped(&self) -> bool {
        self.clipped
    }
}

/// Read-only view of a track, handed out to everything outside of the track manager.
#[derive(Copy, Clone)]
pub struct TrackView<'a> {
    track: &'a Track,
}

impl<'a> TrackView<'a> {
    /// Calls `handler` once per update cycle in which the track changed.
    pub fn register_listener<F>(&self, handler: F) -> Result<ListenerId>
    where
        F: FnMut(&dyn TrackInfo) + 'static,
    {
        let mut listeners = self
            .track
            .listeners
            .try_borrow_mut()
            .map_err(|_| Error::ListenerBusy)?;
        Ok(listeners.register(Box::new(handler)))
    }

    pub fn unregister_listener(&self, id: ListenerId) -> Result<bool> {
        let mut listeners = self
            .track
            .listeners
            .try_borrow_mut()
            .map_err(|_| Error::ListenerBusy)?;
        Ok(listeners.unregister(id))
    }

    pub fn listener_count(&self) -> usize {
        self.track
            .listeners
            .try_borrow()
            .map(|l| l.len())
            .unwrap_or_default()
    }

    pub fn send(&self, index: usize) -> Option<SendView<'a>> {
        self.track.send(index).map(TrackSend::view)
    }

    pub fn sends(&self) -> impl Iterator<Item = SendView<'a>> {
        self.track.sends.iter_active().map(TrackSend::view)
    }
}

impl TrackInfo for TrackView<'_> {
    fn id(&self) -> TrackId {
        self.track.id()
    }

    fn name(&self) -> &str {
        self.track.name()
    }

    fn volume(&self) -> f64 {
        self.track.volume()
    }

    fn pan(&self) -> f64 {
        self.track.pan()
    }

    fn muted(&self) -> bool {
        self.track.muted()
    }

    fn soloed(&self) -> bool {
        self.track.soloed()
    }

    fn record_armed(&self) -> bool {
        self.track.record_armed()
    }

    fn is_folder(&self) -> bool {
        self.track.is_folder()
    }

    fn color(&self) -> Color {
        self.track.color()
    }

    fn hidden(&self) -> bool {
        self.track.hidden()
    }

    fn send_count(&self) -> usize {
        self.track.send_count()
    }

    fn hardware_output_count(&self) -> usize {
        self.track.hardware_output_count()
    }

    fn receive_count(&self) -> usize {
        self.track.receive_count()
    }

    fn clipped(&self) -> bool {
        self.track.clipped()
    }
}

impl std::fmt::Debug for TrackView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("TrackView")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("hidden", &self.hidden())
            .field("volume", &self.volume())
            .field("sends", &self.send_count())
            .finish()
    }
}

pub(crate) fn update<T: PartialEq + Clone>(field: &mut T, value: &T) -> bool {
    if field != value {
        field.clone_from(value);
        true
    } else {
        false
    }
}
