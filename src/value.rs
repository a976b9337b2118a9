//! The observable value container.
//!
//! This module provides [`ObservableValue`], a mutable single-value container
//! that synchronously notifies registered listeners on every assignment. It
//! is the single-threaded counterpart of a watch channel: handles are cheap
//! `Rc` clones over shared state, readers borrow the current value through a
//! guard, and async consumers suspend on [`next`](ObservableValue::next) or
//! [`watch`](ObservableValue::watch) until a later assignment delivers a
//! value.

use std::{
    borrow,
    cell::{Ref, RefCell},
    collections::HashMap,
    fmt,
    hash::Hash,
    mem,
    ops::Deref,
    rc::Rc,
};

use crate::{
    listener::{Listener, ListenerId, Registry},
    next::Next,
    stream::Watch,
};

/// Shared state behind every handle to one observable value.
///
/// The value and the listener registry live in separate cells so a
/// notification pass can run listeners without keeping the value borrowed:
/// listeners may read, or even reassign, the value reentrantly.
pub(crate) struct Inner<T> {
    /// The current value.
    value: RefCell<T>,
    /// Registered listeners plus pass bookkeeping.
    listeners: RefCell<Registry<T>>,
}

impl<T> Inner<T> {
    pub(crate) fn register(&self, listener: Listener<T>) -> ListenerId {
        self.listeners.borrow_mut().insert(listener)
    }

    pub(crate) fn deregister(&self, id: ListenerId) {
        self.listeners.borrow_mut().remove(id);
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        self.listeners.borrow_mut().close_all();
    }
}

/// A mutable single-value container with change notification.
///
/// Cloning produces another handle to the same underlying value; the state is
/// freed once every handle is dropped. Any waiter still suspended at that
/// point is woken and observes [`NextError::Closed`](crate::error::NextError).
pub struct ObservableValue<T> {
    inner: Rc<Inner<T>>,
}

impl<T> ObservableValue<T> {
    /// Creates a new observable holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(initial),
                listeners: RefCell::new(Registry::new()),
            }),
        }
    }

    /// Returns a read-only guard to the current value.
    ///
    /// The guard implements `Deref<Target = T>`. It keeps the value cell
    /// borrowed, so it must not be held across a call to
    /// [`set`](Self::set) on the same observable.
    #[must_use]
    pub fn borrow(&self) -> Guard<'_, T> {
        Guard {
            inner: self.inner.value.borrow(),
        }
    }

    /// Registers a listener invoked with every value assigned from now on.
    ///
    /// The listener is not called with the current value; its first
    /// invocation happens on the next assignment. A listener registered
    /// while a notification pass is running is not invoked in that pass.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut(&T) + 'static,
    {
        self.inner.register(Listener::Callback(Box::new(listener)))
    }

    /// Deregisters a listener. A no-op if the id is absent or already
    /// removed.
    ///
    /// Removal takes effect immediately, even from inside a listener during
    /// a notification pass: a listener removed mid-pass is not invoked later
    /// in the same pass.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner.deregister(id);
    }

    /// Returns the number of currently registered listeners, including
    /// pending waiters.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Checks if two handles refer to the same underlying value.
    #[must_use]
    pub fn same_source(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Waits for the next change, resolving with the assigned value.
    ///
    /// The returned future registers its one-shot waiter immediately, so an
    /// assignment made between this call and the first poll is still
    /// observed. It never resolves with the value current at call time, and
    /// if no further assignment happens it stays pending until every handle
    /// to the observable is dropped, at which point it resolves to
    /// [`NextError::Closed`](crate::error::NextError). Dropping the future
    /// deregisters the waiter.
    ///
    /// # Example
    ///
    /// ```
    /// use gaze::ObservableValue;
    ///
    /// # async fn doc() {
    /// let state = ObservableValue::new("idle");
    /// let next = state.next();
    /// state.set("running");
    /// assert_eq!(next.await.unwrap(), "running");
    /// # }
    /// ```
    #[must_use]
    pub fn next(&self) -> Next<T> {
        Next::register(&self.inner)
    }

    /// Returns a stream of successive values.
    ///
    /// Nothing is registered until the stream is first polled. After each
    /// yield the stream re-arms a fresh waiter before handing the value
    /// back, so between yields exactly one listener from this stream is
    /// registered; assignments made while no waiter is armed are missed.
    /// The stream never ends while a handle to the observable exists, and
    /// yields `None` once every handle is dropped. Dropping the stream
    /// deregisters any armed waiter.
    ///
    /// # Example
    ///
    /// ```
    /// use futures_util::{join, StreamExt};
    /// use gaze::ObservableValue;
    ///
    /// # async fn doc() {
    /// let state = ObservableValue::new(0);
    /// let mut changes = state.watch();
    ///
    /// // This assignment happens while no waiter is armed; it is not
    /// // replayed by the stream.
    /// state.set(1);
    ///
    /// let (value, ()) = join!(changes.next(), async { state.set(2) });
    /// assert_eq!(value, Some(2));
    /// # }
    /// ```
    #[must_use]
    pub fn watch(&self) -> Watch<T> {
        Watch::new(Rc::downgrade(&self.inner))
    }
}

impl<T: Clone> ObservableValue<T> {
    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        (*self.inner.value.borrow()).clone()
    }

    /// Replaces the stored value and synchronously notifies every listener.
    ///
    /// There is no change detection: assigning a value equal to the current
    /// one still triggers a full notification pass. Listeners run after the
    /// value is committed, so reads from inside a listener observe the new
    /// value. A reentrant assignment from inside a listener is deferred:
    /// the running pass finishes delivering its own value, then a follow-up
    /// pass delivers the latest committed value to every listener. A
    /// listener that reassigns unconditionally on every delivery therefore
    /// never lets this call return. A panicking listener propagates out of
    /// this call and aborts notification of the remaining listeners in the
    /// pass.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.notify();
    }

    /// Replaces the stored value, returning the previous one, and notifies
    /// every listener.
    #[must_use]
    pub fn replace(&self, mut value: T) -> T {
        mem::swap(&mut *self.inner.value.borrow_mut(), &mut value);
        self.notify();
        value
    }

    /// Mutates the value in place, then notifies every listener.
    ///
    /// The pass runs unconditionally, whether or not `modify` changed
    /// anything.
    pub fn modify<F>(&self, modify: F)
    where
        F: FnOnce(&mut T),
    {
        modify(&mut self.inner.value.borrow_mut());
        self.notify();
    }

    /// Runs notification passes until every assignment has been delivered.
    ///
    /// The registry entries are checked out for the duration of a pass so
    /// listeners can subscribe, unsubscribe, or reassign the value without
    /// re-entering a borrowed cell. Each listener receives a reference to a
    /// pass-local clone of the value committed by the triggering assignment.
    ///
    /// A reentrant assignment from inside a listener finds the entries
    /// checked out; it marks the registry dirty and returns, and the
    /// outermost call loops, re-snapshotting and delivering the latest
    /// committed value to the full listener set. Successive reentrant
    /// assignments within one pass coalesce into that latest value.
    fn notify(&self) {
        {
            let mut registry = self.inner.listeners.borrow_mut();
            if registry.in_pass() {
                registry.mark_dirty();
                return;
            }
        }
        loop {
            let snapshot = {
                let mut registry = self.inner.listeners.borrow_mut();
                if registry.is_empty() {
                    return;
                }
                registry.begin_pass()
            };
            let current = (*self.inner.value.borrow()).clone();
            let mut kept = Vec::with_capacity(snapshot.len());
            for (id, mut listener) in snapshot {
                let detached = self.inner.listeners.borrow().is_detached(id);
                if detached {
                    continue;
                }
                match &mut listener {
                    Listener::Callback(callback) => callback(&current),
                    Listener::Waiter(slot) => {
                        // One-shot: fire and drop the entry.
                        slot.borrow_mut().fill(current.clone());
                        continue;
                    }
                }
                kept.push((id, listener));
            }
            let mut registry = self.inner.listeners.borrow_mut();
            registry.end_pass(kept);
            if !registry.take_dirty() {
                return;
            }
        }
    }

    /// Creates a dependent observable whose value is `transform` applied to
    /// this one.
    ///
    /// The derived value starts at `transform(&current)` and is reassigned
    /// on every source change through a permanent listener on this
    /// observable. The derived observable has its own independent listener
    /// registry.
    ///
    /// # Example
    ///
    /// ```
    /// use gaze::ObservableValue;
    ///
    /// let state = ObservableValue::new(3);
    /// let doubled = state.derive(|n| n * 2);
    /// assert_eq!(doubled.get(), 6);
    ///
    /// state.set(5);
    /// assert_eq!(doubled.get(), 10);
    /// ```
    #[must_use]
    pub fn derive<U, F>(&self, mut transform: F) -> ObservableValue<U>
    where
        U: Clone + 'static,
        F: FnMut(&T) -> U + 'static,
    {
        let derived = ObservableValue::new(transform(&self.borrow()));
        let target = derived.clone();
        self.subscribe(move |value| target.set(transform(value)));
        derived
    }

    /// Combines several observables into one holding a mapping from key to
    /// each source's current value.
    ///
    /// The initial mapping is fully populated from every source before the
    /// combined observable is constructed. One permanent listener is
    /// registered per source, one source at a time (not transactionally);
    /// any source change re-publishes the whole mapping. The map is only
    /// borrowed for registration: the combined observable does not keep the
    /// sources alive, so an entry stops updating once the caller drops
    /// every handle to its source.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    ///
    /// use gaze::ObservableValue;
    ///
    /// let width = ObservableValue::new(80);
    /// let height = ObservableValue::new(24);
    /// let size = ObservableValue::merge(&HashMap::from([
    ///     ("width", width.clone()),
    ///     ("height", height.clone()),
    /// ]));
    /// assert_eq!(size.get()["height"], 24);
    ///
    /// height.set(50);
    /// assert_eq!(size.get()["height"], 50);
    /// assert_eq!(size.get()["width"], 80);
    /// ```
    #[must_use]
    pub fn merge<K>(sources: &HashMap<K, ObservableValue<T>>) -> ObservableValue<HashMap<K, T>>
    where
        K: Clone + Eq + Hash + 'static,
        T: 'static,
    {
        let initial: HashMap<K, T> = sources
            .iter()
            .map(|(key, source)| (key.clone(), source.get()))
            .collect();
        let merged = ObservableValue::new(initial);
        for (key, source) in sources {
            let key = key.clone();
            let target = merged.clone();
            source.subscribe(move |value| {
                target.modify(|mapping| {
                    mapping.insert(key.clone(), value.clone());
                });
            });
        }
        merged
    }
}

impl<T> Clone for ObservableValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Default> Default for ObservableValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObservableValue")
            .field(&*self.inner.value.borrow())
            .finish()
    }
}

/// A read-only guard providing access to the current value.
///
/// # Lifetime Note
/// The guard holds a borrow on the value cell. While it is alive, the same
/// observable cannot be assigned to; keep guard lifetimes short.
#[derive(Debug)]
pub struct Guard<'a, T> {
    inner: Ref<'a, T>,
}

impl<T> Deref for Guard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.inner.deref()
    }
}

impl<T> AsRef<T> for Guard<'_, T> {
    #[inline]
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T> borrow::Borrow<T> for Guard<'_, T> {
    #[inline]
    fn borrow(&self) -> &T {
        self
    }
}
