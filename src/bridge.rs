// SPDX-License-Identifier: Apache-2.0

//! [`EventBridge`]: registration lifecycle and teardown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::slot::EventSlot;
use crate::source::{DeliveryHandle, EventSource};
use crate::status::BridgeError;
use crate::stream::EventStream;

/// Owns the source registration and the handoff slot.
///
/// `open` registers the source exactly once; dropping the bridge (directly
/// or via the [`EventStream`] that consumed it) unregisters exactly once
/// and then resolves any still-pending operation with
/// [`BridgeError::Closed`].
pub struct EventBridge<S, T>
where
    S: EventSource<T>,
{
    slot: Arc<EventSlot<T>>,
    source: S,
    registration: Option<S::Registration>,
}

impl<S, T> EventBridge<S, T>
where
    S: EventSource<T>,
{
    /// Register `source` and wire its deliveries into a fresh slot.
    ///
    /// On failure the source error is returned as
    /// [`BridgeError::Registration`] and nothing is left half-registered:
    /// the slot was never observable and `unregister` will not be called.
    pub fn open(mut source: S) -> Result<Self, BridgeError> {
        let slot = Arc::new(EventSlot::new());
        let delivery = DeliveryHandle::new(Arc::clone(&slot));
        let registration = source
            .register(delivery)
            .map_err(|err| BridgeError::Registration(Box::new(err)))?;
        debug!("event source registered");
        Ok(Self {
            slot,
            source,
            registration: Some(registration),
        })
    }

    /// Consume the bridge into its pull-side event sequence.
    ///
    /// Taking the bridge by value is what makes the sequence
    /// single-consumer: there is no second handle left to drive operations
    /// from.
    pub fn into_events(self, token: CancellationToken) -> EventStream<S, T> {
        EventStream::new(self, token)
    }

    /// Number of deliveries so far that found no operation pending.
    pub fn dropped_events(&self) -> u64 {
        self.slot.dropped_events()
    }

    pub(crate) fn slot(&self) -> &Arc<EventSlot<T>> {
        &self.slot
    }
}

impl<S, T> Drop for EventBridge<S, T>
where
    S: EventSource<T>,
{
    fn drop(&mut self) {
        // Unregister first so no new deliveries target the slot, then
        // resolve whatever was still pending.
        if let Some(registration) = self.registration.take() {
            self.source.unregister(registration);
            debug!("event source unregistered");
        }
        self.slot.close();
    }
}
