//! A two-cell state container for one writer and one real-time reader.
use std::cell::UnsafeCell;

use crate::counter::{AtomicCounter, PairCounter};
use crate::state::Snapshot;
use crate::sync::{AtomicU32, Ordering};

/// A double-buffered shared state.
///
/// One cell is *current* and owned by the reader; the other is the write
/// target. A writer populates the target between [`write_begin`] and
/// [`write_end`], after which the change is pending; the reader makes it
/// current with [`try_switch`]. Reading is wait-free: one atomic load plus a
/// bitwise copy.
///
/// Write sections may nest: an inner `write_begin`/`write_end` pair inside
/// an outer one returns the same cell and only the outermost `write_end`
/// publishes. The nesting depth is tracked per instance, so all writes must
/// come from a single thread; concurrent writers on one instance tear the
/// payload (the counter itself stays consistent). The reader and any number
/// of [`snapshot`](Snapshot::snapshot) observers may run concurrently with
/// the writer.
///
/// When the container is placed in a shared-memory region the layout is the
/// counter word immediately followed by the two cells; the nesting depth
/// word trails the cell array.
///
/// [`write_begin`]: DoubleState::write_begin
/// [`write_end`]: DoubleState::write_end
/// [`try_switch`]: DoubleState::try_switch
#[repr(C)]
pub struct DoubleState<T: Copy> {
    counter: AtomicCounter<PairCounter>,
    cells: [UnsafeCell<T>; 2],
    write_depth: AtomicU32,
}

unsafe impl<T: Copy + Send> Send for DoubleState<T> {}
unsafe impl<T: Copy + Send> Sync for DoubleState<T> {}

impl<T: Copy> DoubleState<T> {
    /// Creates a container with both cells holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            counter: AtomicCounter::new(),
            cells: [UnsafeCell::new(initial), UnsafeCell::new(initial)],
            write_depth: AtomicU32::new(0),
        }
    }

    /// Copies the current cell. Wait-free; safe to call from the real-time
    /// thread at any point in a cycle.
    pub fn read(&self) -> T {
        let cell = self.counter.load().cur_cell();
        // SAFETY: Every cell is initialized at construction, and the writer
        // only ever targets the non-current cell, so no write overlaps this
        // copy of the current one.
        unsafe { self.cells[cell].get().read() }
    }

    /// Opens a write section and returns the cell to populate.
    ///
    /// The outermost call invalidates any unconsumed pending change and, if
    /// the previous change was already consumed, refreshes the target cell
    /// from the current one so the writer mutates the published baseline.
    /// Nested calls return the same cell.
    ///
    /// The pointer is valid until the matching [`write_end`]. Writes must
    /// all come from one thread per instance, and nothing may hold the
    /// pointer across `write_end`; within those rules, writing through it
    /// never races the reader, which only ever copies the other cell.
    ///
    /// [`write_end`]: DoubleState::write_end
    pub fn write_begin(&self) -> *mut T {
        let cell = if self.write_depth.fetch_add(1, Ordering::Relaxed) == 0 {
            self.write_begin_outer()
        } else {
            // Inside an outer write section the counter's next cell is
            // stable: it only moves on try_switch, and the outer call
            // already invalidated the pending index.
            self.counter.load().next_cell()
        };
        self.cells[cell].get()
    }

    fn write_begin_outer(&self) -> usize {
        loop {
            let old = self.counter.load();
            let mut new = old;
            let need_copy = !old.has_pending();
            new.set_next_index(old.cur_index());
            if self.counter.compare_exchange(old, new) {
                let target = new.next_cell();
                if need_copy {
                    // The previous publish was consumed, so the target cell
                    // still holds a retired generation. Start from the
                    // published value instead.
                    // SAFETY: The exchange above granted this (sole) writer
                    // the target cell, which is not the current cell;
                    // readers only copy the current one, and both cells were
                    // initialized at construction.
                    unsafe {
                        self.cells[target]
                            .get()
                            .write(self.cells[new.cur_cell()].get().read())
                    };
                }
                return target;
            }
        }
    }

    /// Closes a write section. The outermost call marks the written cell
    /// pending, to be picked up by the reader's next [`try_switch`].
    ///
    /// [`try_switch`]: DoubleState::try_switch
    pub fn write_end(&self) {
        let depth = self.write_depth.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(depth > 0, "write_end without a matching write_begin");
        if depth == 1 {
            loop {
                let old = self.counter.load();
                let mut new = old;
                new.set_next_index(old.next_index().wrapping_add(1));
                if self.counter.compare_exchange(old, new) {
                    break;
                }
            }
        }
    }

    /// Runs `f` on the write target inside a single
    /// [`write_begin`]/[`write_end`] pair.
    ///
    /// This is the ordinary way to publish a change:
    ///
    /// ```
    /// use stateswap::state::DoubleState;
    ///
    /// let state = DoubleState::new(0u64);
    /// state.write(|value| *value = 7);
    /// assert_eq!(state.try_switch(), 7);
    /// ```
    ///
    /// `f` gets exclusive access to the cell, so `write` must not be called
    /// again from inside `f`; use the raw [`write_begin`]/[`write_end`] pair
    /// for nested write sections.
    ///
    /// [`write_begin`]: DoubleState::write_begin
    /// [`write_end`]: DoubleState::write_end
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let cell = self.write_begin();
        // SAFETY: write_begin returned a valid pointer to the non-current
        // cell, which this single writer holds exclusively until the
        // matching write_end; no other reference to it exists while `f`
        // runs, since `write` must not be reentered.
        let result = f(unsafe { &mut *cell });
        self.write_end();
        result
    }

    /// Makes any pending change current and returns the current payload.
    ///
    /// Idempotent: with no pending change this re-reads the same cell. The
    /// real-time reader calls it once at the start of each cycle.
    pub fn try_switch(&self) -> T {
        self.try_switch_checked().0
    }

    /// Like [`try_switch`](DoubleState::try_switch), also reporting whether
    /// a pending change was actually switched in.
    pub fn try_switch_checked(&self) -> (T, bool) {
        loop {
            let old = self.counter.load();
            let mut new = old;
            new.set_cur_index(old.next_index());
            if self.counter.compare_exchange(old, new) {
                return (self.read(), old.has_pending());
            }
        }
    }

    /// Whether a completed write is waiting to be switched in.
    pub fn pending_change(&self) -> bool {
        self.counter.load().has_pending()
    }

    /// The raw current index. Advances by one per consumed publish cycle;
    /// cold readers use it as their validation bracket.
    pub fn current_index(&self) -> u16 {
        self.counter.load().cur_index()
    }
}

impl<T: Copy + Default> Default for DoubleState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy> Snapshot for DoubleState<T> {
    type Value = T;

    fn current(&self) -> T {
        self.read()
    }

    fn version(&self) -> u32 {
        self.current_index() as u32
    }
}
