use std::time::{Duration, Instant};

use log::{info, warn};
use reacomms_proto::command::{osc, set_position, track_command, Action, TrackParam};
use reacomms_proto::{tag, CommandBatch, ImmutableCommandBatch};
use ringbuf::Consumer;

use crate::command_state::CommandStates;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::listeners::{ListenerId, Listeners};
use crate::rec_arm::RecArmCounter;
use crate::timekeeper::Timekeeper;
use crate::tracks::TrackManager;
use crate::transport::{PollRequest, State, Transport};
use crate::TrackId;

pub type BatchHandler = dyn FnMut(ImmutableCommandBatch<'_>);

/// Entry point for everything that talks to the remote side.
///
/// `Comms` does no I/O itself. The owner calls [`Comms::tick`] on a timer, issues the returned
/// request and hands the answer back to [`Comms::on_response`]. Commands from other threads
/// arrive through the ring buffer consumer and are sent with the next request.
pub struct Comms {
    config: Config,
    transport: Transport,
    command_queue: Consumer<String>,
    batch: CommandBatch,
    tracks: TrackManager,
    timekeeper: Timekeeper,
    command_states: CommandStates,
    listeners: Listeners<BatchHandler>,
}

impl Comms {
    pub fn new(config: Config, command_queue: Consumer<String>) -> Result<Comms> {
        let config = config.clamped();
        let mut transport = Transport::new(config.min_update, &config.base_path)?;
        transport.register_recurring(tag::TRACK, Some(config.track_refresh));
        Timekeeper::subscribe(&mut transport, config.transport_refresh);
        let command_states = CommandStates::new();
        command_states.subscribe(&mut transport, config.options_refresh);
        Ok(Comms {
            config,
            transport,
            command_queue,
            batch: CommandBatch::new(),
            tracks: TrackManager::new(),
            timekeeper: Timekeeper::new(),
            command_states,
            listeners: Listeners::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn min_update(&self) -> Duration {
        self.transport.min_update()
    }

    pub fn start(&mut self) {
        self.transport.start();
    }

    pub fn stop(&mut self) {
        self.transport.stop();
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    pub fn state(&self) -> State {
        self.transport.state()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Sends `command` once with the next request.
    pub fn request(&mut self, command: &str) {
        self.transport.enqueue_once(command);
    }

    /// Sends `command` every `interval`. Intervals shorter than the minimum update interval are
    /// raised to it.
    pub fn request_recurring(&mut self, command: &str, interval: Option<Duration>) {
        let interval = interval.map(|i| i.max(self.transport.min_update()));
        self.transport.register_recurring(command, interval);
    }

    pub fn cancel_recurring(&mut self, command: &str) {
        self.transport.cancel_recurring(command);
    }

    /// Returns the request to issue now, if any.
    pub fn tick(&mut self, now: Instant) -> Option<PollRequest> {
        if !self.transport.is_running() {
            return None;
        }
        self.handle_command_queue();
        self.transport.tick(now)
    }

    /// Completes the outstanding request. Failures are logged and dropped, the next tick
    /// tries again with whatever accumulated in the meantime.
    pub fn on_response(&mut self, response: Result<String>) {
        self.transport.complete();
        let body = match response {
            Ok(body) => body,
            Err(err) => {
                warn!("Request failed: {}", err);
                return;
            }
        };
        if body.is_empty() {
            return;
        }
        self.batch.parse(&body);
        let batch = self.batch.as_immutable();
        self.tracks.reconcile(batch, &mut self.transport);
        self.timekeeper.reconcile(batch);
        self.command_states.reconcile(batch);
        self.listeners.notify_with(|handler| handler(batch));
    }

    /// Called with every successfully parsed batch.
    pub fn register_listener<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(ImmutableCommandBatch<'_>) + 'static,
    {
        self.listeners.register(Box::new(handler))
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    pub fn tracks(&self) -> &TrackManager {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut TrackManager {
        &mut self.tracks
    }

    pub fn rec_arm(&self) -> &RecArmCounter {
        self.tracks.rec_arm()
    }

    pub fn timekeeper(&self) -> &Timekeeper {
        &self.timekeeper
    }

    pub fn timekeeper_mut(&mut self) -> &mut Timekeeper {
        &mut self.timekeeper
    }

    pub fn command_states(&self) -> &CommandStates {
        &self.command_states
    }

    pub fn command_states_mut(&mut self) -> &mut CommandStates {
        &mut self.command_states
    }

    pub fn action(&mut self, action: Action) {
        self.request(&action.command());
    }

    pub fn set_track(&mut self, track: TrackId, param: &TrackParam) {
        self.request(&track_command(track, param));
    }

    pub fn send_osc(&mut self, path: &str, value: Option<&str>) {
        self.request(&osc(path, value));
    }

    pub fn set_tempo(&mut self, bpm: f64) -> Result<()> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(Error::Validation(format!("tempo {} must be positive", bpm)));
        }
        self.send_osc("tempo/raw", Some(&bpm.to_string()));
        Ok(())
    }

    pub fn jump_to_position(&mut self, position: &str) {
        self.request(&set_position(position));
    }

    /// Resets the clip indicator of a track locally.
    pub fn clear_clip(&mut self, track: TrackId) -> Result<()> {
        self.tracks.clear_clip(track)
    }

    fn handle_command_queue(&mut self) {
        let mut count = 0;
        self.command_queue.pop_each(
            |c| {
                self.transport.enqueue_once(&c);
                count += 1;
                true
            },
            None,
        );
        if count > 0 {
            info!("Queued {} user command(s).", count);
        }
    }
}

impl std::fmt::Debug for Comms {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Comms")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("tracks", &self.tracks)
            .finish()
    }
}
