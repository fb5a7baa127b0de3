//! A three-cell state container with two independent pending slots.
use std::cell::UnsafeCell;

use crate::counter::{AtomicCounter, Slot, TripleCounter};
use crate::state::Snapshot;

/// A triple-buffered shared state with two write channels.
///
/// One cell is *current*; the other two back the write slots [`Slot::One`]
/// and [`Slot::Two`]. Each slot is armed independently by its own writer and
/// promoted on demand by the reader, so two categories of change (say, graph
/// edits and port edits) can be prepared concurrently without either writer
/// waiting on the other.
///
/// The cell a slot writes into is not fixed: it is derived from the counter
/// by the swap rule in [`TripleCounter::swap_cell`], which guarantees the
/// target is never the current cell and that the two slots never resolve to
/// the same cell. On promotion the armed cell and the current cell trade
/// roles.
///
/// Writers must partition by slot: one thread per slot at a time. Two
/// writers on the *same* slot tear the payload (the counter stays
/// consistent). The reader side follows the same roles as
/// [`DoubleState`](crate::state::DoubleState): a single promoting real-time
/// reader, any number of [`snapshot`](Snapshot::snapshot) observers.
///
/// When the container is placed in a shared-memory region the layout is the
/// counter word followed by the three cells, in declaration order.
#[repr(C)]
pub struct TripleState<T: Copy> {
    counter: AtomicCounter<TripleCounter>,
    cells: [UnsafeCell<T>; 3],
}

unsafe impl<T: Copy + Send> Send for TripleState<T> {}
unsafe impl<T: Copy + Send> Sync for TripleState<T> {}

impl<T: Copy> TripleState<T> {
    /// Creates a container with all three cells holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            counter: AtomicCounter::new(),
            cells: [
                UnsafeCell::new(initial),
                UnsafeCell::new(initial),
                UnsafeCell::new(initial),
            ],
        }
    }

    /// Copies the current cell. Wait-free.
    pub fn read(&self) -> T {
        let cell = self.counter.load().current_cell();
        // SAFETY: Every cell is initialized at construction, and the swap
        // rule never binds a write slot to the current cell, so no write
        // overlaps this copy.
        unsafe { self.cells[cell].get().read() }
    }

    /// Opens a write on `slot` and returns the cell to populate.
    ///
    /// Disarms the slot, so a previously armed but unconsumed change stops
    /// being switchable until the next [`write_end`]. If the slot was *not*
    /// armed, its cell still holds a retired generation and is refreshed
    /// from the current cell first.
    ///
    /// The pointer is valid until the matching [`write_end`] for this slot.
    /// One writer thread per slot; writing through the pointer never races
    /// the reader, which only copies the current cell.
    ///
    /// [`write_end`]: TripleState::write_end
    pub fn write_begin(&self, slot: Slot) -> *mut T {
        self.write_begin_checked(slot).0
    }

    /// Like [`write_begin`](TripleState::write_begin), also reporting
    /// whether the slot was still armed from a publish the reader never
    /// consumed.
    pub fn write_begin_checked(&self, slot: Slot) -> (*mut T, bool) {
        loop {
            let old = self.counter.load();
            let mut new = old;
            let was_armed = old.written(slot);
            let target = old.swap_cell(slot) as usize;
            new.set_written(slot, false);
            if self.counter.compare_exchange(old, new) {
                if !was_armed {
                    // SAFETY: The exchange above bound `target` to this
                    // slot's (sole) writer, the swap rule keeps it distinct
                    // from the current cell and from the other slot's cell,
                    // and every cell was initialized at construction.
                    unsafe {
                        self.cells[target]
                            .get()
                            .write(self.cells[old.current_cell()].get().read())
                    };
                }
                return (self.cells[target].get(), was_armed);
            }
        }
    }

    /// Closes a write on `slot`, arming it for promotion.
    pub fn write_end(&self, slot: Slot) {
        loop {
            let old = self.counter.load();
            let mut new = old;
            new.set_written(slot, true);
            if self.counter.compare_exchange(old, new) {
                break;
            }
        }
    }

    /// Runs `f` on `slot`'s write target inside a
    /// [`write_begin`]/[`write_end`] pair.
    ///
    /// ```
    /// use stateswap::state::{Slot, TripleState};
    ///
    /// let state = TripleState::new(0u64);
    /// state.write(Slot::One, |value| *value = 7);
    ///
    /// let (value, switched) = state.try_switch_checked(Slot::One);
    /// assert!(switched);
    /// assert_eq!(value, 7);
    /// ```
    ///
    /// [`write_begin`]: TripleState::write_begin
    /// [`write_end`]: TripleState::write_end
    pub fn write<R>(&self, slot: Slot, f: impl FnOnce(&mut T) -> R) -> R {
        let cell = self.write_begin(slot);
        // SAFETY: write_begin returned a valid pointer to the cell bound to
        // `slot`, held exclusively by this slot's single writer until the
        // matching write_end; no other reference to it exists while `f`
        // runs.
        let result = f(unsafe { &mut *cell });
        self.write_end(slot);
        result
    }

    /// Promotes `slot` if it is armed and returns the current payload.
    ///
    /// On promotion the armed cell becomes current, the slot is disarmed,
    /// and the switch counter advances. With `slot` unarmed this leaves the
    /// state untouched.
    pub fn try_switch(&self, slot: Slot) -> T {
        self.try_switch_checked(slot).0
    }

    /// Like [`try_switch`](TripleState::try_switch), also reporting whether
    /// a promotion occurred.
    pub fn try_switch_checked(&self, slot: Slot) -> (T, bool) {
        loop {
            let old = self.counter.load();
            let mut new = old;
            let armed = old.written(slot);
            if armed {
                new.set_current_cell(old.swap_cell(slot));
                new.set_written(slot, false);
                new.bump_switch_count();
            }
            if self.counter.compare_exchange(old, new) {
                return (self.read(), armed);
            }
        }
    }

    /// The number of promotions so far, mod 256. Cold readers use it as
    /// their validation bracket.
    pub fn current_switch_count(&self) -> u8 {
        self.counter.load().switch_count()
    }
}

impl<T: Copy + Default> Default for TripleState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy> Snapshot for TripleState<T> {
    type Value = T;

    fn current(&self) -> T {
        self.read()
    }

    fn version(&self) -> u32 {
        self.current_switch_count() as u32
    }
}
