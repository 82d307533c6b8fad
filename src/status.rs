// SPDX-License-Identifier: Apache-2.0

//! Error and cancellation types shared across the bridge surface.

use std::fmt::{self, Display, Formatter};

/// Why a pending operation was resolved without an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CancelKind {
    /// The cancellation token the stream was created with fired.
    Cancelled,
    /// The bridge was torn down while the operation was still pending.
    Closed,
}

/// Errors surfaced by the bridge.
///
/// Dropped events are deliberately not represented here: a delivery that
/// finds no pending operation is expected behavior, not a failure.
#[derive(Debug)]
pub enum BridgeError {
    /// The event source could not install its hook at registration time.
    Registration(Box<dyn std::error::Error + Send + Sync>),
    /// A second operation was started while one was already pending.
    ///
    /// This is a usage error on the consumer side. The operation that was
    /// already pending is left untouched and will still complete normally.
    OperationPending,
    /// The operation was resolved by cancellation before an event arrived.
    Cancelled,
    /// The bridge was closed while the operation was pending.
    Closed,
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration(err) => {
                write!(f, "event source registration failed: {}", err)
            }
            Self::OperationPending => {
                write!(f, "another operation is already pending on this bridge")
            }
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Closed => write!(f, "bridge closed while operation was pending"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registration(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<CancelKind> for BridgeError {
    fn from(kind: CancelKind) -> Self {
        match kind {
            CancelKind::Cancelled => Self::Cancelled,
            CancelKind::Closed => Self::Closed,
        }
    }
}
