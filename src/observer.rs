use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Handle returned when registering a listener. Hand it back to the
/// matching `unsubscribe` call to stop receiving notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Ordered listener registry shared by the buffer and the paragraph index.
///
/// Listeners are called synchronously, in registration order. A listener
/// that reaches back into the object currently notifying it will hit an
/// already-borrowed `RefCell` and panic; callbacks must only record what
/// they observed.
pub struct Listeners<L: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Rc<RefCell<L>>)>,
}

impl<L: ?Sized> Listeners<L> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, listener: Rc<RefCell<L>>) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        Subscription(id)
    }

    /// Returns false when the handle was already removed.
    pub fn remove(&mut self, subscription: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(id, _)| *id != subscription.0);
        self.entries.len() != before
    }

    pub fn notify(&self, mut deliver: impl FnMut(&mut L)) {
        for (_, listener) in &self.entries {
            deliver(&mut *listener.borrow_mut());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> fmt::Debug for Listeners<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}
