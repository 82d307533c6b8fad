// SPDX-License-Identifier: Apache-2.0

//! [`EventStream`]: the pull-side sequence of operations.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::bridge::EventBridge;
use crate::slot::NextEvent;
use crate::source::EventSource;
use crate::status::BridgeError;

/// Unbounded, single-consumer sequence of [`NextEvent`] operations.
///
/// Created by [`EventBridge::into_events`]; owns the bridge, so dropping
/// the stream unregisters the source and cancels any pending operation.
/// The sequence is infinite and not restartable: every operation shares
/// the one underlying slot.
///
/// Two ways to drive it:
///
/// - [`next`](Self::next) hands out one fresh operation at a time for
///   explicit `select!`-style composition;
/// - the [`futures::Stream`] impl yields raw event values and ends when
///   the cancellation token fires or the bridge closes.
pub struct EventStream<S, T>
where
    S: EventSource<T>,
{
    bridge: EventBridge<S, T>,
    token: CancellationToken,
    current: Option<NextEvent<T>>,
}

impl<S, T> EventStream<S, T>
where
    S: EventSource<T>,
{
    pub(crate) fn new(bridge: EventBridge<S, T>, token: CancellationToken) -> Self {
        Self {
            bridge,
            token,
            current: None,
        }
    }

    /// Produce the next operation, in its created (unpublished) state.
    ///
    /// Publishing into the slot happens when the returned future is first
    /// polled, not here. The `&mut` receiver keeps requests sequential;
    /// the slot rejects a second concurrently awaited operation with
    /// [`BridgeError::OperationPending`](crate::BridgeError) as the
    /// runtime backstop.
    pub fn next(&mut self) -> NextEvent<T> {
        // Drop any half-driven Stream item so its slot claim is withdrawn.
        self.current = None;
        NextEvent::new(Arc::clone(self.bridge.slot()), self.token.clone())
    }

    /// The cancellation token every operation of this stream observes.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Number of deliveries so far that found no operation pending.
    pub fn dropped_events(&self) -> u64 {
        self.bridge.dropped_events()
    }
}

impl<S, T> Stream for EventStream<S, T>
where
    S: EventSource<T> + Unpin,
    S::Registration: Unpin,
{
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        let op = this.current.get_or_insert_with(|| {
            NextEvent::new(Arc::clone(this.bridge.slot()), this.token.clone())
        });
        match Pin::new(op).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(event)) => {
                this.current = None;
                Poll::Ready(Some(event))
            }
            Poll::Ready(Err(BridgeError::OperationPending)) => {
                // A manually driven operation holds the slot; ending the
                // stream beats silently competing with it.
                warn!("event stream ended: another operation is already pending");
                this.current = None;
                Poll::Ready(None)
            }
            Poll::Ready(Err(_)) => {
                this.current = None;
                Poll::Ready(None)
            }
        }
    }
}
