use crate::listeners::{ListenerId, Listeners};

/// Number of record-armed tracks, not counting the master track.
#[derive(Debug, Default)]
pub struct RecArmCounter {
    armed: usize,
    listeners: Listeners<dyn FnMut(&usize)>,
}

impl RecArmCounter {
    pub fn new() -> RecArmCounter {
        RecArmCounter::default()
    }

    pub fn armed_count(&self) -> usize {
        self.armed
    }

    pub fn any_armed(&self) -> bool {
        self.armed > 0
    }

    /// Called with the new count whenever it changes.
    pub fn register_listener<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&usize) + 'static,
    {
        self.listeners.register(Box::new(handler))
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    pub(crate) fn update(&mut self, armed: usize) -> bool {
        if self.armed == armed {
            return false;
        }
        self.armed = armed;
        self.listeners.notify(&armed);
        true
    }
}
