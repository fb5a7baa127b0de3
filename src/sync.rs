#[cfg(feature = "shuttle")]
pub(crate) use shuttle::sync::atomic::{AtomicU32, Ordering};
#[cfg(not(feature = "shuttle"))]
pub(crate) use std::sync::atomic::{AtomicU32, Ordering};
