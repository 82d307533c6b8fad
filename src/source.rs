// SPDX-License-Identifier: Apache-2.0

//! The [`EventSource`] trait and the [`DeliveryHandle`] it receives.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::slot::EventSlot;

/// A callback-driven event source that the bridge adapts.
///
/// The bridge calls [`register`](Self::register) exactly once, handing the
/// source a [`DeliveryHandle`]; the source keeps the handle and calls
/// [`DeliveryHandle::deliver`] from its own thread for every raw event. At
/// teardown the bridge calls [`unregister`](Self::unregister) exactly once
/// with the registration returned by `register`.
///
/// Both calls run synchronously on the consumer side and must not block for
/// long; `unregister` is infallible by contract.
pub trait EventSource<T> {
    /// Opaque proof of registration, owned exclusively by the bridge
    /// between `register` and `unregister`.
    type Registration;

    /// Reported when the source cannot install its hook.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Install the hook and start delivering events through `delivery`.
    fn register(&mut self, delivery: DeliveryHandle<T>) -> Result<Self::Registration, Self::Error>;

    /// Remove the hook. Deliveries that race past this point are dropped
    /// by the bridge, not errors.
    fn unregister(&mut self, registration: Self::Registration);
}

/// Push side of the bridge, handed to the source at registration.
///
/// Cloneable and usable from any thread. The handle stays valid after the
/// bridge is torn down; deliveries made then find no pending operation and
/// are dropped like any other unconsumed event.
pub struct DeliveryHandle<T> {
    slot: Arc<EventSlot<T>>,
}

impl<T> DeliveryHandle<T> {
    pub(crate) fn new(slot: Arc<EventSlot<T>>) -> Self {
        Self { slot }
    }

    /// Hand one raw event to the consumer.
    ///
    /// Returns `true` when a pending operation received the event, `false`
    /// when the event was dropped because nothing was waiting. The work
    /// done on the calling thread is bounded: one pointer swap and, on the
    /// `true` path, one short lock and one waker invocation. The consumer's
    /// continuation itself runs on the consumer's executor.
    pub fn deliver(&self, event: T) -> bool {
        self.slot.deliver(event)
    }

    /// Number of deliveries so far that found no operation pending.
    pub fn dropped_events(&self) -> u64 {
        self.slot.dropped_events()
    }
}

impl<T> Clone for DeliveryHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Debug for DeliveryHandle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryHandle")
            .field("dropped_events", &self.dropped_events())
            .finish()
    }
}
