// SPDX-License-Identifier: Apache-2.0

//! Internal synchronization between the delivery thread and the consumer.
//!
//! The slot is a single atomic pointer holding at most one pending
//! operation. Publish, deliver, and withdraw are each one indivisible
//! pointer exchange with ownership-transfer semantics, so completion
//! happens exactly once per operation with no spin window.

mod operation;
mod state;

pub use operation::NextEvent;
pub(crate) use state::EventSlot;
