//! Bookkeeping types for the listener registry.
//!
//! Listeners are identified by explicit integer handles rather than by
//! closure identity, so deregistration is an O(1) map removal and a handle
//! can never be registered twice.

use std::{cell::RefCell, collections::HashMap, mem, rc::Rc, task::Waker};

/// Identifies one registered listener on one observable value.
///
/// Returned by [`subscribe`](crate::ObservableValue::subscribe) and consumed
/// by [`unsubscribe`](crate::ObservableValue::unsubscribe). Ids are never
/// reused within a single observable.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

/// A registered party interested in value changes.
pub(crate) enum Listener<T> {
    /// Permanent callback, invoked with a reference to each new value.
    Callback(Box<dyn FnMut(&T)>),
    /// One-shot waiter backing `next()` and `watch()`.
    ///
    /// Consumed by the first notification pass that fires it, so it is
    /// invoked at most once and never survives the pass.
    Waiter(Rc<RefCell<Slot<T>>>),
}

/// Hand-off cell between a notification pass and a suspended waiter.
pub(crate) struct Slot<T> {
    pub(crate) value: Option<T>,
    pub(crate) waker: Option<Waker>,
    pub(crate) closed: bool,
}

impl<T> Slot<T> {
    pub(crate) fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Slot {
            value: None,
            waker: None,
            closed: false,
        }))
    }

    /// Stores the delivered value and wakes the parked task.
    pub(crate) fn fill(&mut self, value: T) {
        self.value = Some(value);
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    /// Marks the source as gone and wakes the parked task so it can observe
    /// the closure.
    pub(crate) fn close(&mut self) {
        self.closed = true;
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// The listener registry, plus the bookkeeping needed to mutate it while a
/// notification pass has the entries checked out.
///
/// A pass takes the whole entry map out of the registry, invokes each
/// listener without holding any borrow, and merges survivors back. Ids
/// removed while the entries are checked out are recorded in `detached` so
/// the merge discards them.
pub(crate) struct Registry<T> {
    entries: HashMap<ListenerId, Listener<T>>,
    next_id: u64,
    /// Whether a notification pass currently has the entries checked out.
    notifying: bool,
    /// Set by a reentrant assignment; the outermost pass re-delivers the
    /// latest committed value once the current pass ends.
    dirty: bool,
    /// Ids removed while a pass had the entries checked out.
    detached: Vec<ListenerId>,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Registry {
            entries: HashMap::new(),
            next_id: 0,
            notifying: false,
            dirty: false,
            detached: Vec::new(),
        }
    }

    /// Registers a listener under a fresh id.
    ///
    /// During an active pass this lands in the (checked-out) registry's
    /// fresh map, so the listener is not invoked until the next pass.
    pub(crate) fn insert(&mut self, listener: Listener<T>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, listener);
        id
    }

    /// Removes a listener. A no-op for absent ids.
    ///
    /// If the entries are currently checked out by a pass, the id is
    /// recorded so the pass skips the listener and drops its entry instead
    /// of merging it back.
    pub(crate) fn remove(&mut self, id: ListenerId) {
        if self.entries.remove(&id).is_none() && self.notifying {
            self.detached.push(id);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks the entries out for a notification pass.
    ///
    /// A fresh pass delivers the latest committed value, so it also clears
    /// any dirtiness left by an earlier reentrant assignment.
    pub(crate) fn begin_pass(&mut self) -> HashMap<ListenerId, Listener<T>> {
        self.notifying = true;
        self.dirty = false;
        mem::take(&mut self.entries)
    }

    /// Whether `id` was removed while the current pass was running.
    pub(crate) fn is_detached(&self, id: ListenerId) -> bool {
        self.detached.contains(&id)
    }

    /// Whether a notification pass has the entries checked out.
    pub(crate) fn in_pass(&self) -> bool {
        self.notifying
    }

    /// Records a reentrant assignment for the running pass to re-deliver.
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears and returns the dirty flag.
    pub(crate) fn take_dirty(&mut self) -> bool {
        mem::take(&mut self.dirty)
    }

    /// Merges the surviving entries of a pass back into the registry.
    ///
    /// Listeners registered during the pass are already present and are
    /// kept; detached ids are dropped.
    pub(crate) fn end_pass(&mut self, kept: Vec<(ListenerId, Listener<T>)>) {
        for (id, listener) in kept {
            if !self.is_detached(id) {
                self.entries.insert(id, listener);
            }
        }
        self.notifying = false;
        self.detached.clear();
    }

    /// Wakes every pending waiter with the closed flag set.
    ///
    /// Called when the last handle to the observable is dropped, so pending
    /// `next()` futures resolve to an error instead of pending forever.
    pub(crate) fn close_all(&mut self) {
        for listener in self.entries.values() {
            if let Listener::Waiter(slot) = listener {
                slot.borrow_mut().close();
            }
        }
    }
}
