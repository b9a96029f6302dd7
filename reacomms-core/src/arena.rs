use std::ops::Range;

/// Growable indexed store with an active flag per slot.
///
/// The remote side reports only how many entities exist, never which one was created or
/// destroyed. Slots are therefore allocated up to the highest count seen and never freed or
/// reindexed; a smaller count deactivates the tail and a larger one reactivates it. Slots below
/// `floor` are never deactivated.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<T>,
    active: Vec<bool>,
    floor: usize,
}

/// What a call to [`Arena::resize_with`] changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resize {
    pub allocated: Range<usize>,
    pub enabled: Vec<usize>,
    pub disabled: Vec<usize>,
}

impl Resize {
    pub fn is_unchanged(&self) -> bool {
        self.allocated.is_empty() && self.enabled.is_empty() && self.disabled.is_empty()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Arena<T> {
        Arena::with_floor(0)
    }

    pub fn with_floor(floor: usize) -> Arena<T> {
        Arena {
            slots: Vec::new(),
            active: Vec::new(),
            floor,
        }
    }

    /// Pushes an active slot. Used for entities that exist before the first count arrives.
    pub fn push(&mut self, value: T) -> usize {
        self.slots.push(value);
        self.active.push(true);
        self.slots.len() - 1
    }

    /// Makes exactly the slots `0..count` active, allocating missing ones with `alloc`.
    pub fn resize_with(&mut self, count: usize, mut alloc: impl FnMut(usize) -> T) -> Resize {
        let mut resize = Resize {
            allocated: self.slots.len()..self.slots.len(),
            ..Resize::default()
        };
        while self.slots.len() < count {
            let index = self.slots.len();
            self.slots.push(alloc(index));
            // New slots start inactive and get enabled below like any other.
            self.active.push(false);
        }
        resize.allocated.end = self.slots.len();
        for (index, active) in self.active.iter_mut().enumerate() {
            let wanted = index < count || index < self.floor;
            if wanted && !*active {
                *active = true;
                resize.enabled.push(index);
            } else if !wanted && *active {
                *active = false;
                resize.disabled.push(index);
            }
        }
        resize
    }

    /// Number of slots ever allocated.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &T> {
        self.slots
            .iter()
            .zip(self.active.iter())
            .filter(|(_, active)| **active)
            .map(|(slot, _)| slot)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
