//! Lock-free state containers for a single real-time reader.
//!
//! This module contains the two state-exchange containers used to hand
//! mutable engine state (port graphs, control parameters, client tables)
//! from non-real-time writer threads to the audio callback without ever
//! making the callback wait on a lock.
//!
//! - [`DoubleState`] holds a current/next cell pair for a single writer,
//!   with support for nested write sections.
//! - [`TripleState`] holds one current cell plus two independently armed
//!   pending slots, so two writers can prepare changes concurrently.
//!
//! Both containers are driven by one packed counter word (see
//! [`counter`](crate::counter)): every protocol step is a single
//! compare-exchange, and the real-time reader's view is always one atomic
//! load away.
//!
//! # Reader roles
//!
//! The *real-time reader* promotes pending changes with `try_switch` once
//! per cycle and then reads the current cell freely; each read is wait-free.
//! *Cold readers* (introspection, tooling) must instead go through
//! [`Snapshot::snapshot`], which brackets the copy with a monotonic version
//! and retries until the bracket is stable.
//!
//! # Examples
//!
//! Hand a control block from a worker thread to a consumer.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use stateswap::state::DoubleState;
//!
//! #[derive(Clone, Copy, Default, PartialEq, Debug)]
//! struct Controls {
//!     gain: f32,
//!     muted: bool,
//! }
//!
//! let state: Arc<DoubleState<Controls>> = Arc::new(DoubleState::default());
//!
//! let writer = {
//!     let state = Arc::clone(&state);
//!     thread::spawn(move || {
//!         state.write(|controls| {
//!             controls.gain = 0.5;
//!             controls.muted = true;
//!         });
//!     })
//! };
//! writer.join().unwrap();
//!
//! // The reader picks up the pending change at the start of its cycle.
//! let controls = state.try_switch();
//! assert_eq!(
//!     controls,
//!     Controls {
//!         gain: 0.5,
//!         muted: true
//!     }
//! );
//! ```
use core::hint;

mod double;
pub use self::double::DoubleState;
mod triple;
pub use self::triple::TripleState;

pub use crate::counter::Slot;

/// Consistent reads for cold (non-real-time) observers.
///
/// The real-time reader owns the current cell for a whole cycle and may copy
/// it without validation. Any other reader races against promotions: the
/// cell it is copying can be retired and handed back to a writer mid-copy.
/// [`snapshot`](Self::snapshot) detects this by re-reading a monotonic
/// version after the copy and retrying on a mismatch.
///
/// Termination relies on promotions being rare relative to one loop
/// iteration, which holds in the single-promoter regime this crate is built
/// for.
pub trait Snapshot {
    type Value: Copy;

    /// Copies the current cell without validation.
    fn current(&self) -> Self::Value;

    /// A version that changes on every promotion.
    ///
    /// For [`TripleState`] this wraps mod 256; a snapshot would only be
    /// fooled by exactly 256 promotions inside one read bracket, far beyond
    /// any plausible read latency.
    fn version(&self) -> u32;

    /// Copies the current cell, retrying until no promotion intervened.
    fn snapshot(&self) -> Self::Value {
        loop {
            let start = self.version();
            let value = self.current();
            if self.version() == start {
                return value;
            }
            hint::spin_loop();
        }
    }
}
