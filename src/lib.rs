//! # `Gaze`
//!
//! A minimal observable-value primitive: a mutable container that
//! synchronously notifies registered listeners on every change, with both
//! callback-based and iteration-based subscription models.
//!
//! The container is single-threaded and runtime-agnostic: handles are cheap
//! `Rc` clones, listener invocation happens inside
//! [`set`](ObservableValue::set), and the async surface works with any
//! async runtime (tokio, smol, compio, etc.).
//!
//! # Features
//!
//! - **Callback subscriptions**: register a `FnMut` listener invoked with
//!   every new value, deregister it by handle.
//! - **One-shot await**: [`ObservableValue::next`] resolves with the value of
//!   the first assignment after the call.
//! - **Change streams**: [`ObservableValue::watch`] yields successive values
//!   as a [`Stream`](futures_util::Stream).
//! - **Combinators**: [`derive`](ObservableValue::derive) and
//!   [`merge`](ObservableValue::merge) build dependent observables.
//!
//! # Usage
//!
//! ```
//! use gaze::ObservableValue;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let state = ObservableValue::new(1);
//!
//! // The waiter is registered when `next` is called, not when it is first
//! // polled, so an assignment made before the await is still observed.
//! let next = state.next();
//! state.set(2);
//! assert_eq!(next.await.unwrap(), 2);
//! assert_eq!(state.get(), 2);
//! # }
//! ```

mod listener;
mod next;
mod stream;
mod value;

pub use listener::ListenerId;
pub use next::Next;
pub use stream::Watch;
pub use value::{Guard, ObservableValue};

/// Error types for observable-value operations.
pub mod error {
    use thiserror::Error;

    /// Error returned when waiting for a change that can no longer happen.
    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum NextError {
        /// Every handle to the observable was dropped while waiting.
        #[error("failed to observe next change: observable was dropped")]
        Closed,
    }
}
