//! Fixed-capacity stack counters over caller-owned storage.
//!
//! The counters never touch memory themselves: `push` hands back the slot index to write, `pop` the slot
//! index that was vacated. All operations are O(1) and the preconditions (`!is_full()` before a push,
//! `!is_empty()` before a pop) are the caller's to uphold; they are only checked by debug assertions.
//! Being plain values, the counters can be copied or relocated freely together with their storage.

/// Single-sided stack counter growing from index `0` upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookasideStack {
    capacity: usize,
    count: usize,
}

impl LookasideStack {
    pub const fn new(capacity: usize) -> Self {
        Self { capacity, count: 0 }
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub const fn is_full(&self) -> bool {
        self.count == self.capacity
    }

    /// Index of the current top. Only meaningful when not empty.
    #[inline]
    pub const fn top_index(&self) -> usize {
        self.count.wrapping_sub(1)
    }

    /// Reserve the next slot and return its index.
    #[inline]
    pub fn push(&mut self) -> usize {
        debug_assert!(!self.is_full(), "push on full lookaside stack (capacity {})", self.capacity);
        self.count += 1;
        self.count - 1
    }

    /// Release the top slot and return its index.
    #[inline]
    pub fn pop(&mut self) -> usize {
        debug_assert!(!self.is_empty(), "pop on empty lookaside stack");
        self.count -= 1;
        self.count
    }

    /// Shrink to `count` entries. Growing through `truncate` is not allowed.
    #[inline]
    pub fn truncate(&mut self, count: usize) {
        debug_assert!(count <= self.count, "truncate may only shrink ({} > {})", count, self.count);
        self.count = count.min(self.count);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.count = 0;
    }
}

/// Two stacks sharing one buffer: the low side grows from `0` upward, the high side from `capacity`
/// downward. The stacks are full together once the sides meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookasideDoubleStack {
    capacity: usize,
    count_low: usize,
    count_high: usize,
}

impl LookasideDoubleStack {
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            count_low: 0,
            count_high: 0,
        }
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub const fn count_low(&self) -> usize {
        self.count_low
    }

    #[inline]
    pub const fn count_high(&self) -> usize {
        self.count_high
    }

    #[inline]
    pub const fn count(&self) -> usize {
        self.count_low + self.count_high
    }

    #[inline]
    pub const fn is_full(&self) -> bool {
        self.count_low + self.count_high == self.capacity
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count_low == 0 && self.count_high == 0
    }

    #[inline]
    pub const fn is_low_empty(&self) -> bool {
        self.count_low == 0
    }

    #[inline]
    pub const fn is_high_empty(&self) -> bool {
        self.count_high == 0
    }

    #[inline]
    pub const fn top_index_low(&self) -> usize {
        self.count_low.wrapping_sub(1)
    }

    /// Index of the most recently pushed high-side slot (equals `capacity` while the high side is empty).
    #[inline]
    pub const fn top_index_high(&self) -> usize {
        self.capacity - self.count_high
    }

    #[inline]
    pub fn push_low(&mut self) -> usize {
        debug_assert!(!self.is_full(), "push_low on full lookaside double stack");
        self.count_low += 1;
        self.count_low - 1
    }

    #[inline]
    pub fn push_high(&mut self) -> usize {
        debug_assert!(!self.is_full(), "push_high on full lookaside double stack");
        self.count_high += 1;
        self.capacity - self.count_high
    }

    #[inline]
    pub fn pop_low(&mut self) -> usize {
        debug_assert!(!self.is_low_empty(), "pop_low on empty low side");
        self.count_low -= 1;
        self.count_low
    }

    #[inline]
    pub fn pop_high(&mut self) -> usize {
        debug_assert!(!self.is_high_empty(), "pop_high on empty high side");
        let index = self.capacity - self.count_high;
        self.count_high -= 1;
        index
    }

    #[inline]
    pub fn truncate_low(&mut self, count: usize) {
        debug_assert!(count <= self.count_low);
        self.count_low = count.min(self.count_low);
    }

    #[inline]
    pub fn truncate_high(&mut self, count: usize) {
        debug_assert!(count <= self.count_high);
        self.count_high = count.min(self.count_high);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.count_low = 0;
        self.count_high = 0;
    }
}

/// A [`LookasideStack`] bundled with its pre-sized storage.
///
/// The storage is allocated once in [`LookasideBuffer::new`]; pushing never reallocates.
#[derive(Debug, Clone)]
pub struct LookasideBuffer<T: Copy> {
    storage: Box<[T]>,
    stack: LookasideStack,
}

impl<T: Copy> LookasideBuffer<T> {
    pub fn new(capacity: usize, fill: T) -> Self {
        Self {
            storage: vec![fill; capacity].into_boxed_slice(),
            stack: LookasideStack::new(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stack.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.stack.is_full()
    }

    #[inline]
    pub fn push(&mut self, value: T) {
        let index = self.stack.push();
        self.storage[index] = value;
    }

    #[inline]
    pub fn pop(&mut self) -> T {
        let index = self.stack.pop();
        self.storage[index]
    }

    #[inline]
    pub fn top(&self) -> Option<&T> {
        if self.stack.is_empty() {
            None
        } else {
            Some(&self.storage[self.stack.top_index()])
        }
    }

    #[inline]
    pub fn top_mut(&mut self) -> Option<&mut T> {
        if self.stack.is_empty() {
            None
        } else {
            Some(&mut self.storage[self.stack.top_index()])
        }
    }

    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.stack.truncate(len);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.storage[..self.stack.count()]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.storage[..self.stack.count()]
    }

    /// The whole backing storage, lent out as scratch while the buffer holds nothing.
    #[inline]
    pub fn lend_idle_storage(&mut self) -> &mut [T] {
        debug_assert!(self.is_empty(), "lending storage of a buffer that still holds {} values", self.len());
        &mut self.storage
    }
}
