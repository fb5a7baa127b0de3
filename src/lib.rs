//! Lock-free state exchange primitives for real-time audio engines.
pub mod counter;
pub mod state;
pub(crate) mod sync;
