// SPDX-License-Identifier: Apache-2.0

use parking_lot::Mutex as ParkingMutex;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Waker;
use tracing::trace;

use crate::status::CancelKind;

/// Per-operation completion cell.
///
/// The cell doubles as the trampoline of the handoff: whoever takes it out
/// of the slot owns the right to complete the operation, exactly once. The
/// waker the consumer parks here is the only state the delivery thread
/// touches besides the event value itself.
pub(crate) struct OperationCell<T> {
    state: ParkingMutex<OpState<T>>,
}

enum OpState<T> {
    Idle,
    Waiting(Waker),
    Delivered(T),
    Cancelled(CancelKind),
}

impl<T> OperationCell<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: ParkingMutex::new(OpState::Idle),
        })
    }

    /// Move the event into the cell and wake the consumer.
    pub(crate) fn complete_delivered(&self, event: T) {
        self.finish(OpState::Delivered(event));
    }

    /// Resolve the cell without an event.
    pub(crate) fn complete_cancelled(&self, kind: CancelKind) {
        self.finish(OpState::Cancelled(kind));
    }

    /// First completion wins; later attempts are ignored without touching
    /// the stored outcome. The waker is invoked outside the lock.
    fn finish(&self, outcome: OpState<T>) {
        let waker = {
            let mut state = self.state.lock();
            if matches!(*state, OpState::Delivered(_) | OpState::Cancelled(_)) {
                return;
            }
            match std::mem::replace(&mut *state, outcome) {
                OpState::Waiting(waker) => Some(waker),
                _ => None,
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Take the outcome if the cell has been completed, otherwise park the
    /// caller's waker (refreshing any previously parked one).
    pub(crate) fn poll_outcome(&self, waker: &Waker) -> Option<Result<T, CancelKind>> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, OpState::Idle) {
            OpState::Delivered(event) => Some(Ok(event)),
            OpState::Cancelled(kind) => Some(Err(kind)),
            OpState::Idle | OpState::Waiting(_) => {
                *state = OpState::Waiting(waker.clone());
                None
            }
        }
    }
}

/// Single-capacity handoff between the delivery thread and the consumer.
///
/// The slot is one atomic pointer: null when empty, otherwise a leaked
/// `Arc<OperationCell>` reference for the one pending operation. Publishing
/// is a single compare-exchange, so there is no window in which an
/// operation is visible without its completion path; the two-field race
/// of split operation/trampoline designs cannot occur here.
///
/// Ownership transfers with the pointer: the thread that swaps the cell out
/// (a delivery, a withdrawal, or close) holds the only right to complete
/// that operation, which makes duplicate delivery structurally impossible.
pub(crate) struct EventSlot<T> {
    pending: AtomicPtr<OperationCell<T>>,
    dropped: AtomicU64,
    // The raw pointer hides an owned Arc<OperationCell<T>> reference; this
    // restores the auto-trait bounds that ownership implies.
    _owns: PhantomData<OperationCell<T>>,
}

/// Publish found the slot already occupied by another pending operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct SlotBusy;

impl<T> EventSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            pending: AtomicPtr::new(ptr::null_mut()),
            dropped: AtomicU64::new(0),
            _owns: PhantomData,
        }
    }

    /// Publish `cell` as the pending operation. The slot holds one Arc
    /// reference until a delivery, a withdrawal, or close takes it back.
    pub(crate) fn publish(&self, cell: &Arc<OperationCell<T>>) -> Result<(), SlotBusy> {
        let raw = Arc::into_raw(Arc::clone(cell)).cast_mut();
        match self.pending.compare_exchange(
            ptr::null_mut(),
            raw,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                trace!("operation published");
                Ok(())
            }
            Err(_) => {
                // Slot occupied: return the reference we just leaked and
                // leave the pending operation untouched.
                // SAFETY: `raw` came from `Arc::into_raw` two lines up and
                // was rejected by the compare-exchange, so we still own it.
                unsafe { drop(Arc::from_raw(raw)) };
                Err(SlotBusy)
            }
        }
    }

    /// Hand one raw event to the pending operation, if any.
    ///
    /// Returns `true` when an operation was completed, `false` when the
    /// event was dropped because the slot was empty. Runs on the delivery
    /// thread; the work is one swap, one lock on the taken cell, one wake.
    pub(crate) fn deliver(&self, event: T) -> bool {
        match self.take() {
            Some(cell) => {
                cell.complete_delivered(event);
                true
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("event dropped: no operation pending");
                false
            }
        }
    }

    /// Remove `cell` from the slot if it is still the pending operation.
    ///
    /// Used by cancellation and by operation drop. Returns `false` when a
    /// delivery (or close) already took the cell, in which case that taker
    /// owns the completion and the caller must not assume the slot state.
    pub(crate) fn withdraw(&self, cell: &Arc<OperationCell<T>>) -> bool {
        let raw = Arc::as_ptr(cell).cast_mut();
        match self.pending.compare_exchange(
            raw,
            ptr::null_mut(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                // SAFETY: the slot held a leaked reference to exactly this
                // cell; the successful exchange transferred it to us.
                unsafe { drop(Arc::from_raw(raw)) };
                trace!("operation withdrawn");
                true
            }
            Err(_) => false,
        }
    }

    /// Empty the slot, resolving any pending operation with `Closed`.
    pub(crate) fn close(&self) {
        if let Some(cell) = self.take() {
            cell.complete_cancelled(CancelKind::Closed);
        }
    }

    fn take(&self) -> Option<Arc<OperationCell<T>>> {
        let raw = self.pending.swap(ptr::null_mut(), Ordering::AcqRel);
        if raw.is_null() {
            None
        } else {
            // SAFETY: a non-null pointer in the slot is always a leaked
            // Arc reference from `publish`; the swap made it exclusively ours.
            Some(unsafe { Arc::from_raw(raw) })
        }
    }

    /// Number of deliveries that found no operation pending.
    pub(crate) fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        self.pending.load(Ordering::Acquire).is_null()
    }
}

impl<T> Drop for EventSlot<T> {
    fn drop(&mut self) {
        // Reclaim the leaked reference if an operation is still published.
        self.close();
    }
}
