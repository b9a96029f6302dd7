use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};
use reacomms_proto::command::{get, Action};
use reacomms_proto::{tag, Command, ImmutableCommandBatch};

use crate::error::Result;
use crate::listeners::{ListenerId, Listeners};
use crate::transport::Transport;

/// Toggle state of a command code. `-1` means the command has no toggle state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommandState {
    pub code: u32,
    pub state: i64,
}

impl CommandState {
    pub fn is_on(&self) -> bool {
        self.state > 0
    }
}

/// Mirror of `CMDSTATE` rows for a set of watched command codes.
#[derive(Debug, Default)]
pub struct CommandStates {
    watched: Vec<u32>,
    states: HashMap<u32, i64>,
    listeners: Listeners<dyn FnMut(&CommandState)>,
}

impl CommandStates {
    /// Watches the metronome and snap toggles.
    pub fn new() -> CommandStates {
        CommandStates::with_codes(&[Action::ToggleMetronome.code(), Action::ToggleSnap.code()])
    }

    pub fn with_codes(codes: &[u32]) -> CommandStates {
        CommandStates {
            watched: codes.to_vec(),
            ..CommandStates::default()
        }
    }

    pub(crate) fn subscribe(&self, transport: &mut Transport, refresh: Duration) {
        let query: String = self.watched.iter().map(|code| get(*code)).collect();
        transport.register_recurring(&query, Some(refresh));
    }

    pub fn watched(&self) -> &[u32] {
        &self.watched
    }

    /// `None` until the first row for `code` arrives.
    pub fn state(&self, code: u32) -> Option<i64> {
        self.states.get(&code).copied()
    }

    pub fn is_on(&self, action: Action) -> bool {
        self.state(action.code()).map_or(false, |state| state > 0)
    }

    /// Called with every state that changed.
    pub fn register_listener<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&CommandState) + 'static,
    {
        self.listeners.register(Box::new(handler))
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    pub(crate) fn reconcile(&mut self, batch: ImmutableCommandBatch<'_>) {
        for row in batch.tagged(tag::CMDSTATE) {
            match parse(row) {
                Ok(state) if self.watched.contains(&state.code) => {
                    if self.states.insert(state.code, state.state) != Some(state.state) {
                        debug!("Command {} is now {}.", state.code, state.state);
                        self.listeners.notify(&state);
                    }
                }
                Ok(_) => {}
                Err(err) => warn!("Skipping CMDSTATE row: {}", err),
            }
        }
    }
}

fn parse(row: Command<'_>) -> Result<CommandState> {
    row.require(3)?;
    Ok(CommandState {
        code: row.code(1)?,
        state: row.integer(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reacomms_proto::CommandBatch;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    fn feed(states: &mut CommandStates, raw: &str) {
        let mut batch = CommandBatch::new();
        batch.parse(raw);
        states.reconcile(batch.as_immutable());
    }

    #[test]
    fn notifies_watched_changes() {
        let mut states = CommandStates::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        states.register_listener(move |s| sink.borrow_mut().push(*s));

        feed(&mut states, "CMDSTATE\t40364\t1\nCMDSTATE\t1157\t0\nCMDSTATE\t999\t1\n");
        feed(&mut states, "CMDSTATE\t40364\t1\nCMDSTATE\t1157\t1\n");

        assert_eq!(
            *seen.borrow(),
            vec![
                CommandState { code: 40364, state: 1 },
                CommandState { code: 1157, state: 0 },
                CommandState { code: 1157, state: 1 },
            ]
        );
        assert!(states.is_on(Action::ToggleMetronome));
        assert_eq!(states.state(999), None);
    }

    #[test]
    fn oversized_code_is_not_a_watched_code() {
        let mut states = CommandStates::new();
        let calls = Rc::new(RefCell::new(0));
        let sink = calls.clone();
        states.register_listener(move |_| *sink.borrow_mut() += 1);

        // 40364 + 2^32
        feed(&mut states, "CMDSTATE\t4295007660\t1\n");
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(states.state(Action::ToggleMetronome.code()), None);
    }

    #[test]
    fn subscribes_to_watched_codes() {
        let states = CommandStates::new();
        let mut transport = Transport::new(Duration::from_millis(10), "/_/").unwrap();
        transport.start();
        states.subscribe(&mut transport, Duration::from_millis(100));
        let request = transport.tick(Instant::now()).unwrap();
        assert_eq!(request.commands(), "GET/40364;GET/1157;");
    }
}
