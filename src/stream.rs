//! Change-stream implementation for observable values.
//!
//! [`Watch`] turns an observable into an unbounded lazy sequence of
//! successive values: each step arms a one-shot waiter, suspends until a
//! value arrives, re-arms, and yields. The stream ends only when every
//! handle to the observable has been dropped.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    rc::Weak,
    task::{Context, Poll, ready},
};

use futures_util::Stream;

use crate::{
    next::Next,
    value::{Inner, ObservableValue},
};

/// Stream returned by [`watch`](crate::ObservableValue::watch).
///
/// Lazy until first polled, infinite while the observable lives, and not
/// restartable: a new call to `watch` is needed to observe from the current
/// point again. Assignments made while no waiter is armed (before the first
/// poll, or after a yielded value was captured but the consumer has not
/// polled again) are missed.
pub struct Watch<T> {
    source: Weak<Inner<T>>,
    pending: Option<Next<T>>,
}

impl<T> Watch<T> {
    pub(crate) fn new(source: Weak<Inner<T>>) -> Self {
        Watch {
            source,
            pending: None,
        }
    }
}

impl<T> Stream for Watch<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = Pin::into_inner(self);
        loop {
            match this.pending.as_mut() {
                None => match this.source.upgrade() {
                    Some(inner) => this.pending = Some(Next::register(&inner)),
                    None => return Poll::Ready(None),
                },
                Some(waiter) => {
                    let result = ready!(Pin::new(waiter).poll(cx));
                    this.pending = None;
                    return match result {
                        Ok(value) => {
                            // Re-arm before yielding so assignments made
                            // while the consumer holds this value are still
                            // caught.
                            if let Some(inner) = this.source.upgrade() {
                                this.pending = Some(Next::register(&inner));
                            }
                            Poll::Ready(Some(value))
                        }
                        Err(_) => Poll::Ready(None),
                    };
                }
            }
        }
    }
}

impl<T> Unpin for Watch<T> {}

impl<T> fmt::Debug for Watch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch").finish()
    }
}

impl<T> From<&ObservableValue<T>> for Watch<T> {
    fn from(value: &ObservableValue<T>) -> Self {
        value.watch()
    }
}
