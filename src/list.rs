//! # Fixed-Capacity List
//!
//! The ordered container underneath the ready and sleep queues. It knows
//! nothing about scheduling: callers decide *where* an element goes and
//! the list only shifts storage to make room or close gaps.
//!
//! Storage is an inline array, so a `FixedList` never allocates.

/// An ordered sequence of at most `N` `Copy` elements.
#[derive(Debug, Clone, Copy)]
pub struct FixedList<T: Copy, const N: usize> {
    items: [Option<T>; N],
    len: usize,
}

impl<T: Copy, const N: usize> FixedList<T, N> {
    /// Create an empty list.
    pub const fn new() -> Self {
        Self {
            items: [None; N],
            len: 0,
        }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn is_full(&self) -> bool {
        self.len == N
    }

    /// Element at `index`, if any.
    pub fn get(&self, index: usize) -> Option<T> {
        if index < self.len {
            self.items[index]
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len {
            self.items[index].as_mut()
        } else {
            None
        }
    }

    /// First element, if any.
    pub fn first(&self) -> Option<T> {
        self.get(0)
    }

    /// Insert `item` so that it ends up at `index`, shifting the tail right.
    ///
    /// `index` is clamped to `len()`. Hands the item back if the list is full.
    pub fn insert_at(&mut self, index: usize, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let index = index.min(self.len);
        let mut i = self.len;
        while i > index {
            self.items[i] = self.items[i - 1];
            i -= 1;
        }
        self.items[index] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Append `item` at the tail.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        self.insert_at(self.len, item)
    }

    /// Remove and return the element at `index`, shifting the tail left.
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let item = self.items[index];
        for i in index..self.len - 1 {
            self.items[i] = self.items[i + 1];
        }
        self.len -= 1;
        self.items[self.len] = None;
        item
    }

    /// Iterate over the elements in order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.items[..self.len].iter().filter_map(|item| *item)
    }

    /// Index of the first element matching `pred`.
    pub fn position<F>(&self, mut pred: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.iter().position(|item| pred(&item))
    }
}

impl<T: Copy + PartialEq, const N: usize> FixedList<T, N> {
    /// Remove the first element equal to `item`. Returns whether one was found.
    pub fn remove(&mut self, item: T) -> bool {
        match self.position(|x| *x == item) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, item: T) -> bool {
        self.iter().any(|x| x == item)
    }
}

impl<T: Copy, const N: usize> Default for FixedList<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
