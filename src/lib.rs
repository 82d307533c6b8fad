// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

// Public API
mod bridge;
mod source;
mod status;
mod stream;

// Internal synchronization (single-slot handoff)
pub(crate) mod slot;

// ── Re-exports ───────────────────────────────────────────────────────

pub use bridge::EventBridge;
pub use slot::NextEvent;
pub use source::{DeliveryHandle, EventSource};
pub use status::{BridgeError, CancelKind};
pub use stream::EventStream;

/// Cancellation primitive observed by every operation of a stream.
pub use tokio_util::sync::CancellationToken;
