use log::{debug, info, warn};
use reacomms_proto::{tag, ImmutableCommandBatch};

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::listeners::{ListenerId, Listeners};
use crate::rec_arm::RecArmCounter;
use crate::send::{SendRow, SendTarget, TargetDisplay, TargetHandle};
use crate::track::{Track, TrackInfo, TrackRow, TrackView, MASTER_TRACK};
use crate::transport::Transport;
use crate::TrackId;

pub type TracksHandler = dyn FnMut(&TrackManager);

/// Keeps the local tracks in line with the `TRACK` and `SEND` rows of every batch.
///
/// The remote side only reports how many tracks exist. Tracks above the reported count are
/// hidden instead of dropped, so a track id always refers to the same slot. The master track
/// always exists.
pub struct TrackManager {
    tracks: Arena<Track>,
    rec_arm: RecArmCounter,
    listeners: Listeners<TracksHandler>,
}

impl TrackManager {
    pub fn new() -> TrackManager {
        let mut tracks = Arena::with_floor(1);
        tracks.push(Track::new(MASTER_TRACK));
        TrackManager {
            tracks,
            rec_arm: RecArmCounter::new(),
            listeners: Listeners::new(),
        }
    }

    /// Number of track slots ever allocated, hidden ones included.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.tracks.active_len()
    }

    /// Any allocated track. Hidden tracks are returned too, check [`TrackInfo::hidden`].
    pub fn track(&self, id: TrackId) -> Option<TrackView<'_>> {
        self.tracks.get(id).map(Track::view)
    }

    pub fn iter(&self) -> impl Iterator<Item = TrackView<'_>> {
        self.tracks.iter_active().map(Track::view)
    }

    pub fn rec_arm(&self) -> &RecArmCounter {
        &self.rec_arm
    }

    pub fn rec_arm_mut(&mut self) -> &mut RecArmCounter {
        &mut self.rec_arm
    }

    /// Called whenever the number of active tracks changes.
    pub fn register_listener<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&TrackManager) + 'static,
    {
        self.listeners.register(Box::new(handler))
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    pub(crate) fn clear_clip(&mut self, id: TrackId) -> Result<()> {
        let track = self
            .tracks
            .get_mut(id)
            .ok_or(Error::UnknownTrack(id))?;
        if track.clear_clip() {
            track.notify();
        }
        Ok(())
    }

    pub(crate) fn reconcile(
        &mut self,
        batch: ImmutableCommandBatch<'_>,
        transport: &mut Transport,
    ) {
        let before = self.tracks.active_len();
        let mut dirty = vec![false; self.tracks.len()];

        let count = batch.tagged(tag::TRACK).count();
        if count > 0 {
            self.resize(count, transport, &mut dirty);
            for row in batch.tagged(tag::TRACK) {
                let result = TrackRow::parse(row).and_then(|row| self.apply_track(&row, transport));
                match result {
                    Ok(Some(id)) => dirty[id] = true,
                    Ok(None) => {}
                    Err(err) => warn!("Skipping TRACK row: {}", err),
                }
            }
        } else {
            debug!("Batch has no TRACK rows, keeping {} tracks.", before);
        }

        // Sends resolve their targets against the tracks updated above.
        for row in batch.tagged(tag::SEND) {
            match SendRow::parse(row).and_then(|row| self.apply_send(&row)) {
                Ok(Some(id)) => dirty[id] = true,
                Ok(None) => {}
                Err(err) => warn!("Skipping SEND row: {}", err),
            }
        }

        for (id, _) in dirty.iter().enumerate().filter(|(_, dirty)| **dirty) {
            if let Some(track) = self.tracks.get(id) {
                track.notify();
            }
        }

        let armed = self
            .tracks
            .iter_active()
            .filter(|t| !t.is_master() && t.record_armed())
            .count();
        self.rec_arm.update(armed);

        if self.tracks.active_len() != before {
            self.notify();
        }
    }

    fn resize(&mut self, count: usize, transport: &mut Transport, dirty: &mut Vec<bool>) {
        let resize = self.tracks.resize_with(count, Track::new);
        if resize.is_unchanged() {
            return;
        }
        info!(
            "Track count is now {} ({} allocated).",
            self.tracks.active_len(),
            self.tracks.len()
        );
        dirty.resize(self.tracks.len(), false);
        for index in resize.enabled {
            if let Some(track) = self.tracks.get_mut(index) {
                dirty[index] |= track.enable();
            }
        }
        for index in resize.disabled {
            if let Some(track) = self.tracks.get_mut(index) {
                dirty[index] |= track.disable(transport);
            }
        }
    }

    /// Returns the id of the track if it changed.
    fn apply_track(
        &mut self,
        row: &TrackRow,
        transport: &mut Transport,
    ) -> Result<Option<TrackId>> {
        if !self.tracks.is_active(row.id) {
            return Err(Error::UnknownTrack(row.id));
        }
        let track = self
            .tracks
            .get_mut(row.id)
            .ok_or(Error::UnknownTrack(row.id))?;
        Ok(track.apply(row, transport).then_some(row.id))
    }

    fn apply_send(&mut self, row: &SendRow) -> Result<Option<TrackId>> {
        if !self.tracks.is_active(row.track) {
            return Err(Error::UnknownTrack(row.track));
        }
        let owner = self
            .tracks
            .get(row.track)
            .ok_or(Error::UnknownTrack(row.track))?;
        let send = owner.send(row.index).ok_or(Error::UnknownSend {
            track: row.track,
            send: row.index,
        })?;

        let handle = match row.target {
            SendTarget::Track(target) if send.needs_target(row.target) => {
                let target = self
                    .tracks
                    .get(target)
                    .filter(|_| self.tracks.is_active(target))
                    .ok_or(Error::UnknownTrack(target))?;
                Some(TargetHandle {
                    listeners: target.listeners().clone(),
                    display: TargetDisplay::of(target),
                })
            }
            _ => None,
        };

        let changed = self
            .tracks
            .get_mut(row.track)
            .ok_or(Error::UnknownTrack(row.track))?
            .send_mut(row.index)?
            .apply(row, handle)?;
        Ok(changed.then_some(row.track))
    }

    fn notify(&mut self) {
        let mut listeners = std::mem::take(&mut self.listeners);
        listeners.notify_with(|handler| handler(self));
        self.listeners = listeners;
    }
}

impl Default for TrackManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TrackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::send::SendInfo;
    use reacomms_proto::CommandBatch;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn track_row(id: usize, name: &str, flags: i64, sends: usize) -> String {
        format!(
            "TRACK\t{}\t{}\t{}\t1\t0\t-100\t-100\t1\t0\t{}\t0\t0\t0\n",
            id, name, flags, sends
        )
    }

    fn tracks(count: usize) -> String {
        (0..count).map(|id| track_row(id, "", 0, 0)).collect()
    }

    struct Fixture {
        manager: TrackManager,
        transport: Transport,
        batch: CommandBatch,
    }

    impl Fixture {
        fn new() -> Fixture {
            Fixture {
                manager: TrackManager::new(),
                transport: Transport::new(Duration::from_millis(10), "/_/").unwrap(),
                batch: CommandBatch::new(),
            }
        }

        fn feed(&mut self, raw: &str) {
            self.batch.parse(raw);
            self.manager
                .reconcile(self.batch.as_immutable(), &mut self.transport);
        }
    }

    #[test]
    fn starts_with_master() {
        let manager = TrackManager::new();
        assert_eq!(manager.active_count(), 1);
        assert!(manager.track(MASTER_TRACK).unwrap().is_master());
    }

    #[test]
    fn grow_shrink_regrow() {
        let mut fixture = Fixture::new();
        fixture.feed(&tracks(2));
        assert_eq!(fixture.manager.len(), 2);
        fixture.feed(&tracks(5));
        assert_eq!(fixture.manager.len(), 5);
        fixture.feed(&tracks(2));
        assert_eq!(fixture.manager.len(), 5);
        assert_eq!(fixture.manager.active_count(), 2);
        assert!(fixture.manager.track(3).unwrap().hidden());
        assert!(fixture.manager.track(4).unwrap().hidden());
        fixture.feed(&tracks(5));
        assert_eq!(fixture.manager.len(), 5);
        assert!(!fixture.manager.track(4).unwrap().hidden());
    }

    #[test]
    fn zero_track_batch_is_ignored() {
        let mut fixture = Fixture::new();
        fixture.feed(&tracks(3));
        fixture.feed("BEATPOS\t1\t0\t0\t0\t0\t4\t4\n");
        assert_eq!(fixture.manager.active_count(), 3);
        fixture.feed("");
        assert_eq!(fixture.manager.active_count(), 3);
    }

    #[test]
    fn one_notification_per_changed_track() {
        let mut fixture = Fixture::new();
        fixture.feed(&tracks(2));
        let calls = Rc::new(RefCell::new(0));
        let sink = calls.clone();
        fixture
            .manager
            .track(1)
            .unwrap()
            .register_listener(move |_| *sink.borrow_mut() += 1)
            .unwrap();

        fixture.feed(&tracks(2));
        assert_eq!(*calls.borrow(), 0);

        let changed = format!("{}{}", track_row(0, "", 0, 0), track_row(1, "Drums", 8 | 16, 0));
        fixture.feed(&changed);
        assert_eq!(*calls.borrow(), 1);
        assert!(fixture.manager.track(1).unwrap().soloed());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let mut fixture = Fixture::new();
        let raw = format!(
            "{}TRACK\t1\tBroken\n{}",
            track_row(0, "", 0, 0),
            track_row(2, "Ok", 0, 0)
        );
        fixture.feed(&raw);
        assert_eq!(fixture.manager.active_count(), 3);
        assert_eq!(fixture.manager.track(2).unwrap().name(), "Ok");
        assert_eq!(fixture.manager.track(1).unwrap().name(), "");
    }

    #[test]
    fn counts_armed_tracks() {
        let mut fixture = Fixture::new();
        let raw = format!(
            "{}{}{}",
            track_row(0, "", 64, 0),
            track_row(1, "", 64, 0),
            track_row(2, "", 64, 0)
        );
        fixture.feed(&raw);
        assert_eq!(fixture.manager.rec_arm().armed_count(), 2);

        fixture.feed(&format!("{}{}", track_row(0, "", 64, 0), track_row(1, "", 64, 0)));
        assert_eq!(fixture.manager.rec_arm().armed_count(), 1);
    }

    #[test]
    fn collection_listeners_see_count_changes() {
        let mut fixture = Fixture::new();
        let counts = Rc::new(RefCell::new(Vec::new()));
        let sink = counts.clone();
        fixture
            .manager
            .register_listener(move |m| sink.borrow_mut().push(m.active_count()));
        fixture.feed(&tracks(3));
        fixture.feed(&tracks(3));
        fixture.feed(&tracks(2));
        assert_eq!(*counts.borrow(), vec![3, 2]);
    }

    #[test]
    fn send_follows_target_rename() {
        let mut fixture = Fixture::new();
        let raw = format!(
            "{}{}{}SEND\t1\t0\t0\t0.5\t0\t2\n",
            track_row(0, "", 0, 0),
            track_row(1, "Vox", 0, 1),
            track_row(2, "", 0, 0)
        );
        fixture.feed(&raw);
        let name = |f: &Fixture| {
            f.manager.track(1).unwrap().send(0).unwrap().target_display().name
        };
        assert_eq!(name(&fixture), "Track 2");

        let renamed = format!(
            "{}{}{}",
            track_row(0, "", 0, 0),
            track_row(1, "Vox", 0, 1),
            track_row(2, "Reverb", 0, 0)
        );
        fixture.feed(&renamed);
        assert_eq!(name(&fixture), "Reverb");
        assert_eq!(fixture.manager.track(2).unwrap().listener_count(), 1);
    }

    #[test]
    fn clear_clip_resets_latch() {
        let mut fixture = Fixture::new();
        fixture.feed("TRACK\t0\t\t0\t1\t0\t12\t0\t1\t0\t0\t0\t0\n");
        assert!(fixture.manager.track(0).unwrap().clipped());
        fixture.manager.clear_clip(0).unwrap();
        assert!(!fixture.manager.track(0).unwrap().clipped());
        assert!(matches!(
            fixture.manager.clear_clip(9),
            Err(Error::UnknownTrack(9))
        ));
    }
}
