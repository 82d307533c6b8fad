// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use super::state::{EventSlot, OperationCell};
use crate::status::BridgeError;

/// One outstanding "await the next event" request.
///
/// Produced by [`EventStream::next`](crate::EventStream::next). Nothing is
/// published into the slot until the first poll, so an operation that is
/// never awaited costs nothing beyond its allocation. Resolves exactly once:
///
/// - `Ok(event)` when the delivery thread hands an event over;
/// - `Err(Cancelled)` when the stream's cancellation token fires first, in
///   which case the slot is cleared immediately rather than left occupied;
/// - `Err(Closed)` when the bridge is torn down while the operation is
///   pending;
/// - `Err(OperationPending)` when another operation was already pending at
///   start, which leaves that other operation untouched.
///
/// Dropping an unresolved operation withdraws it from the slot, so no
/// completion target can dangle.
pub struct NextEvent<T> {
    slot: Arc<EventSlot<T>>,
    cell: Arc<OperationCell<T>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    published: bool,
    done: bool,
}

impl<T> NextEvent<T> {
    pub(crate) fn new(slot: Arc<EventSlot<T>>, token: CancellationToken) -> Self {
        Self {
            slot,
            cell: OperationCell::new(),
            cancelled: Box::pin(token.cancelled_owned()),
            published: false,
            done: false,
        }
    }
}

impl<T> Future for NextEvent<T> {
    type Output = Result<T, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        assert!(!this.done, "NextEvent polled after completion");

        // Start protocol: publish on first poll. A token that is already
        // cancelled never publishes at all.
        if !this.published {
            if this.cancelled.as_mut().poll(cx).is_ready() {
                this.done = true;
                return Poll::Ready(Err(BridgeError::Cancelled));
            }
            if this.slot.publish(&this.cell).is_err() {
                this.done = true;
                return Poll::Ready(Err(BridgeError::OperationPending));
            }
            this.published = true;
        }

        // Outcome first, so a delivery that races cancellation wins.
        if let Some(outcome) = this.cell.poll_outcome(cx.waker()) {
            this.done = true;
            return Poll::Ready(outcome.map_err(BridgeError::from));
        }

        if this.cancelled.as_mut().poll(cx).is_ready() {
            if this.slot.withdraw(&this.cell) {
                this.done = true;
                return Poll::Ready(Err(BridgeError::Cancelled));
            }
            // A delivery already took the cell; its completion will wake
            // the waker parked above.
            if let Some(outcome) = this.cell.poll_outcome(cx.waker()) {
                this.done = true;
                return Poll::Ready(outcome.map_err(BridgeError::from));
            }
        }

        Poll::Pending
    }
}

impl<T> Drop for NextEvent<T> {
    fn drop(&mut self) {
        // An abandoned pending operation must not leave the slot occupied.
        if self.published && !self.done {
            self.slot.withdraw(&self.cell);
        }
    }
}
