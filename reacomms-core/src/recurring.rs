use std::time::{Duration, Instant};

use log::debug;
use reacomms_proto::command::{is_blank, normalize};

/// Commands resent every `interval` until cancelled. All commands sharing an interval are
/// merged into one string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecurringRequest {
    command: String,
    interval: Duration,
    last_fired: Option<Instant>,
}

impl RecurringRequest {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => last + self.interval <= now,
        }
    }
}

/// Registry of periodic queries.
///
/// Merging and cancelling work on raw substrings of the merged command string. Two different
/// commands where one contains the other can therefore cancel each other; callers rely on
/// this matching and it is kept as is.
#[derive(Debug, Default)]
pub struct RecurringRequests {
    requests: Vec<RecurringRequest>,
}

impl RecurringRequests {
    pub fn new() -> RecurringRequests {
        RecurringRequests::default()
    }

    /// Adds `command` to the request for `interval`, creating it if needed. Joining an
    /// existing request resets its timer so the merged command fires on the next check.
    pub fn register(&mut self, command: &str, interval: Duration) {
        let command = normalize(command);
        if is_blank(&command) {
            return;
        }
        match self.requests.iter_mut().find(|r| r.interval == interval) {
            Some(request) => {
                request.command.insert_str(0, &command);
                request.last_fired = None;
            }
            None => self.requests.push(RecurringRequest {
                command,
                interval,
                last_fired: None,
            }),
        }
    }

    /// Removes the first occurrence of `command` from every request containing it. Requests
    /// left empty are dropped, the others have their timer reset.
    pub fn cancel(&mut self, command: &str) {
        let command = normalize(command);
        if is_blank(&command) {
            return;
        }
        self.requests.retain_mut(|request| {
            if !request.command.contains(&command) {
                return true;
            }
            request.command = request.command.replacen(&command, "", 1);
            request.last_fired = None;
            if request.command.is_empty() {
                debug!("Dropping recurring request every {:?}.", request.interval);
                false
            } else {
                true
            }
        });
    }

    /// Collects every request whose interval has elapsed and marks it as fired at `now`.
    pub fn due(&mut self, now: Instant) -> String {
        let mut commands = String::new();
        for request in self.requests.iter_mut().filter(|r| r.is_due(now)) {
            commands.push_str(&request.command);
            request.last_fired = Some(now);
        }
        commands
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecurringRequest> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
