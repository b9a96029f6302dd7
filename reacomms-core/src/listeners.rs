/// Handle returned by [`Listeners::register`]. Unregistering goes through the handle, so two
/// closures that capture the same state are still two listeners.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Fan-out of a payload to handlers, in registration order.
///
/// `H` is the handler type, usually `dyn FnMut(&T)`.
pub struct Listeners<H: ?Sized> {
    next_id: u64,
    handlers: Vec<(ListenerId, Box<H>)>,
}

impl<H: ?Sized> Listeners<H> {
    pub fn new() -> Listeners<H> {
        Listeners {
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: Box<H>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, handler));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        match self.handlers.iter().position(|(i, _)| *i == id) {
            Some(idx) => {
                self.handlers.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.handlers.iter().any(|(i, _)| *i == id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Hands every handler to `call`, for handler types whose payload borrows.
    pub fn notify_with(&mut self, mut call: impl FnMut(&mut H)) {
        for (_, handler) in self.handlers.iter_mut() {
            call(handler);
        }
    }
}

impl<T: ?Sized> Listeners<dyn FnMut(&T)> {
    pub fn notify(&mut self, payload: &T) {
        self.notify_with(|handler| handler(payload));
    }
}

impl<H: ?Sized> Default for Listeners<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> std::fmt::Debug for Listeners<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn notifies_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners: Listeners<dyn FnMut(&u32)> = Listeners::new();
        for name in ["a", "b", "c"] {
            let seen = seen.clone();
            listeners.register(Box::new(move |v: &u32| seen.borrow_mut().push((name, *v))));
        }
        listeners.notify(&7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7), ("c", 7)]);
    }

    #[test]
    fn unregister_by_handle() {
        let count = Rc::new(RefCell::new(0));
        let mut listeners: Listeners<dyn FnMut(&())> = Listeners::new();
        let make = |count: &Rc<RefCell<i32>>| {
            let count = count.clone();
            Box::new(move |_: &()| *count.borrow_mut() += 1)
        };
        let first = listeners.register(make(&count));
        let second = listeners.register(make(&count));
        assert_ne!(first, second);

        assert!(listeners.unregister(first));
        assert!(!listeners.unregister(first));
        assert!(!listeners.contains(first));
        assert!(listeners.contains(second));

        listeners.notify(&());
        assert_eq!(*count.borrow(), 1);
        assert_eq!(listeners.len(), 1);
    }
}
