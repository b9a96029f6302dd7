use std::time::{Duration, Instant};

use log::{debug, info};
use reacomms_proto::command::{is_blank, normalize, request_path};

use crate::error::{Error, Result};
use crate::recurring::RecurringRequests;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    InFlight,
}

/// A request that the caller must issue and answer with [`Transport::complete`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollRequest {
    path: String,
    prefix_len: usize,
}

impl PollRequest {
    /// Full request path, e.g. `/_/GET/40364;TRACK;`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The merged command string without the base path.
    pub fn commands(&self) -> &str {
        &self.path[self.prefix_len..]
    }
}

/// Owner of the outbound channel.
///
/// Each tick merges the pending one-shot commands with the recurring commands that are due into
/// a single request. At most one request is outstanding: ticks while a request is in flight do
/// nothing and the commands keep accumulating until the next tick after the answer.
#[derive(Debug)]
pub struct Transport {
    min_update: Duration,
    base_path: String,
    running: bool,
    state: State,
    pending: String,
    recurring: RecurringRequests,
}

impl Transport {
    pub fn new(min_update: Duration, base_path: &str) -> Result<Transport> {
        if min_update.is_zero() {
            return Err(Error::Construction(
                "minimum update interval must be positive".to_string(),
            ));
        }
        if !base_path.starts_with('/') || !base_path.ends_with('/') {
            return Err(Error::Construction(format!(
                "base path {:?} must start and end with '/'",
                base_path
            )));
        }
        Ok(Transport {
            min_update,
            base_path: base_path.to_string(),
            running: false,
            state: State::Idle,
            pending: String::new(),
            recurring: RecurringRequests::new(),
        })
    }

    /// The smallest interval between two requests. Fixed at construction.
    pub fn min_update(&self) -> Duration {
        self.min_update
    }

    pub fn start(&mut self) {
        if !self.running {
            info!("Starting updates every {:?}.", self.min_update);
            self.running = true;
        }
    }

    /// Stops future ticks. A request already in flight still completes.
    pub fn stop(&mut self) {
        if self.running {
            info!("Stopping updates.");
            self.running = false;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Queues `command` for the next request only.
    pub fn enqueue_once(&mut self, command: &str) {
        let command = normalize(command);
        if !is_blank(&command) {
            self.pending.push_str(&command);
        }
    }

    /// One-shot commands waiting for the next request.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Repeats `command` every `interval`, or every `min_update` when `None`.
    pub fn register_recurring(&mut self, command: &str, interval: Option<Duration>) {
        self.recurring
            .register(command, interval.unwrap_or(self.min_update));
    }

    pub fn cancel_recurring(&mut self, command: &str) {
        self.recurring.cancel(command);
    }

    pub fn recurring(&self) -> &RecurringRequests {
        &self.recurring
    }

    pub fn tick(&mut self, now: Instant) -> Option<PollRequest> {
        if !self.running {
            return None;
        }
        if self.state == State::InFlight {
            debug!("Skipping update, a request is still in flight.");
            return None;
        }
        let mut commands = std::mem::take(&mut self.pending);
        commands.push_str(&self.recurring.due(now));
        if commands.is_empty() {
            return None;
        }
        self.state = State::InFlight;
        let request = PollRequest {
            path: request_path(&self.base_path, &commands),
            prefix_len: self.base_path.len(),
        };
        debug!("Requesting {}", request.path());
        Some(request)
    }

    /// Marks the outstanding request as answered, successfully or not.
    pub fn complete(&mut self) {
        if self.state == State::Idle {
            debug!("Got a response without a request in flight.");
        }
        self.state = State::Idle;
    }
}
