//! Growable ring buffer used for per-instrument tone lists.
//!
//! Capacity is always a power of two so indices wrap with a mask. The
//! engine sizes every deque up front; `push_back`/`push_front` only grow
//! when that estimate was wrong.

use alloc::vec::Vec;

/// Largest capacity a deque may grow to.
const MAX_CAPACITY: usize = 1 << 30;

#[derive(Clone, Debug)]
pub struct Deque<T> {
    buffer: Vec<Option<T>>,
    mask: usize,
    offset: usize,
    count: usize,
}

impl<T> Default for Deque<T> {
    fn default() -> Self {
        Self::with_capacity(1)
    }
}

impl<T> Deque<T> {
    /// A deque holding at least `capacity` items before it needs to grow.
    pub fn with_capacity(capacity: usize) -> Self {
        let size = capacity.max(1).next_power_of_two();
        Self { buffer: (0..size).map(|_| None).collect(), mask: size - 1, offset: 0, count: 0 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn push_back(&mut self, value: T) {
        if self.count == self.buffer.len() {
            self.grow();
        }
        let slot = (self.offset + self.count) & self.mask;
        self.buffer[slot] = Some(value);
        self.count += 1;
    }

    pub fn push_front(&mut self, value: T) {
        if self.count == self.buffer.len() {
            self.grow();
        }
        self.offset = (self.offset + self.mask) & self.mask;
        self.buffer[self.offset] = Some(value);
        self.count += 1;
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let value = self.buffer[self.offset].take();
        self.offset = (self.offset + 1) & self.mask;
        self.count -= 1;
        value
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        self.count -= 1;
        self.buffer[(self.offset + self.count) & self.mask].take()
    }

    pub fn front(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        self.buffer[self.offset].as_ref()
    }

    pub fn back(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        self.buffer[(self.offset + self.count - 1) & self.mask].as_ref()
    }

    /// Item at `index` from the front.
    ///
    /// # Panics
    /// When `index >= len()`.
    pub fn get(&self, index: usize) -> &T {
        assert!(index < self.count, "deque index {index} out of range {}", self.count);
        match &self.buffer[(self.offset + index) & self.mask] {
            Some(value) => value,
            None => unreachable!("occupied deque slot is empty"),
        }
    }

    /// Mutable item at `index` from the front.
    ///
    /// # Panics
    /// When `index >= len()`.
    pub fn get_mut(&mut self, index: usize) -> &mut T {
        assert!(index < self.count, "deque index {index} out of range {}", self.count);
        match &mut self.buffer[(self.offset + index) & self.mask] {
            Some(value) => value,
            None => unreachable!("occupied deque slot is empty"),
        }
    }

    /// Remove and return the item at `index`, shifting later items forward.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.count {
            return None;
        }
        let value = self.buffer[(self.offset + index) & self.mask].take();
        for i in index..self.count - 1 {
            let next = self.buffer[(self.offset + i + 1) & self.mask].take();
            self.buffer[(self.offset + i) & self.mask] = next;
        }
        self.count -= 1;
        value
    }

    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
        self.offset = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        (0..self.count).map(move |i| self.get(i))
    }

    fn grow(&mut self) {
        let new_size = self.buffer.len() * 2;
        assert!(new_size <= MAX_CAPACITY, "deque capacity exceeded");
        let mut buffer: Vec<Option<T>> = (0..new_size).map(|_| None).collect();
        for (i, slot) in buffer.iter_mut().enumerate().take(self.count) {
            *slot = self.buffer[(self.offset + i) & self.mask].take();
        }
        self.buffer = buffer;
        self.mask = new_size - 1;
        self.offset = 0;
    }
}
