//! The one-shot waiter future behind `next()` and `watch()`.

use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
    task::{Context, Poll},
};

use crate::{
    error::NextError,
    listener::{Listener, ListenerId, Slot},
    value::Inner,
};

/// Future returned by [`next`](crate::ObservableValue::next).
///
/// The waiter is registered when this future is created, not when it is
/// first polled, so an assignment made between the call and the first poll
/// is still observed. The future holds only a weak reference to the
/// observable; if every handle is dropped while waiting it resolves to
/// [`NextError::Closed`]. Dropping the future deregisters the waiter.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Next<T> {
    source: Weak<Inner<T>>,
    slot: Rc<RefCell<Slot<T>>>,
    id: ListenerId,
    finished: bool,
}

impl<T> Next<T> {
    pub(crate) fn register(inner: &Rc<Inner<T>>) -> Self {
        let slot = Slot::new();
        let id = inner.register(Listener::Waiter(slot.clone()));
        Next {
            source: Rc::downgrade(inner),
            slot,
            id,
            finished: false,
        }
    }

    fn deregister(&self) {
        if let Some(inner) = self.source.upgrade() {
            inner.deregister(self.id);
        }
    }
}

impl<T> Future for Next<T> {
    type Output = Result<T, NextError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = Pin::into_inner(self);
        let mut slot = this.slot.borrow_mut();
        if let Some(value) = slot.value.take() {
            // The firing pass already consumed the registry entry.
            drop(slot);
            this.finished = true;
            return Poll::Ready(Ok(value));
        }
        if slot.closed {
            drop(slot);
            this.finished = true;
            return Poll::Ready(Err(NextError::Closed));
        }
        slot.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> Drop for Next<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.deregister();
        }
    }
}
