//! Fixed-capacity ring buffer with drop-oldest overflow
//!
//! Each connection's outbound queue. When the buffer is full, enqueuing
//! evicts the oldest element and bumps the dropped counter: for ephemeral
//! telemetry the newest frame is worth more than a complete history.

/// Buffer statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingBufferStats {
    /// Maximum number of items
    pub capacity: usize,
    /// Items currently held
    pub size: usize,
    /// Items evicted by overflow since creation
    pub dropped: u64,
}

/// Array-backed circular queue
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    /// Index of the oldest item
    head: usize,
    size: usize,
    dropped: u64,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            slots,
            head: 0,
            size: 0,
            dropped: 0,
        }
    }

    /// Append an item, evicting the oldest one if full
    ///
    /// Returns the evicted item, if any.
    pub fn enqueue(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.dropped += 1;
            self.dequeue()
        } else {
            None
        };

        let tail = (self.head + self.size) % self.capacity();
        self.slots[tail] = Some(item);
        self.size += 1;

        evicted
    }

    /// Remove and return the oldest item
    pub fn dequeue(&mut self) -> Option<T> {
        if self.size == 0 {
            return None;
        }

        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.size -= 1;
        item
    }

    /// Borrow the oldest item
    pub fn peek(&self) -> Option<&T> {
        if self.size == 0 {
            None
        } else {
            self.slots[self.head].as_ref()
        }
    }

    /// Check if the buffer holds no items
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Check if the next enqueue will evict
    pub fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    /// Number of items held
    pub fn len(&self) -> usize {
        self.size
    }

    /// Maximum number of items
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Items evicted by overflow
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Iterate oldest first without removing
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.size).filter_map(move |i| self.slots[(self.head + i) % self.capacity()].as_ref())
    }

    /// Remove all items (the dropped counter is kept)
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.size = 0;
    }

    /// Get buffer statistics
    pub fn stats(&self) -> RingBufferStats {
        RingBufferStats {
            capacity: self.capacity(),
            size: self.size,
            dropped: self.dropped,
        }
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy out the contents, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut buf = RingBuffer::new(3);
        buf.enqueue(1);
        buf.enqueue(2);

        assert_eq!(buf.peek(), Some(&1));
        assert_eq!(buf.dequeue(), Some(1));
        assert_eq!(buf.dequeue(), Some(2));
        assert_eq!(buf.dequeue(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        for capacity in [1usize, 2, 5, 16] {
            let mut buf = RingBuffer::new(capacity);
            let n = capacity * 3 + 1;
            for i in 0..n {
                buf.enqueue(i);
                assert!(buf.len() <= capacity);
            }

            let expected: Vec<usize> = (n - capacity..n).collect();
            assert_eq!(buf.to_vec(), expected);
            assert_eq!(buf.dropped(), (n - capacity) as u64);
            assert!(buf.is_full());
        }
    }

    #[test]
    fn test_enqueue_returns_evicted() {
        let mut buf = RingBuffer::new(2);
        assert_eq!(buf.enqueue('a'), None);
        assert_eq!(buf.enqueue('b'), None);
        assert_eq!(buf.enqueue('c'), Some('a'));
        assert_eq!(buf.to_vec(), vec!['b', 'c']);
    }

    #[test]
    fn test_wraparound_after_partial_drain() {
        let mut buf = RingBuffer::new(3);
        buf.enqueue(1);
        buf.enqueue(2);
        buf.enqueue(3);
        assert_eq!(buf.dequeue(), Some(1));
        buf.enqueue(4);
        buf.enqueue(5);

        assert_eq!(buf.to_vec(), vec![3, 4, 5]);
        assert_eq!(buf.dropped(), 1);
    }

    #[test]
    fn test_to_vec_is_non_destructive() {
        let mut buf = RingBuffer::new(4);
        buf.enqueue("x");
        buf.enqueue("y");

        assert_eq!(buf.to_vec(), vec!["x", "y"]);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_clear_keeps_dropped_count() {
        let mut buf = RingBuffer::new(1);
        buf.enqueue(1);
        buf.enqueue(2);
        buf.clear();

        assert!(buf.is_empty());
        assert_eq!(buf.peek(), None);
        assert_eq!(
            buf.stats(),
            RingBufferStats {
                capacity: 1,
                size: 0,
                dropped: 1
            }
        );
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut buf = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.enqueue(7);
        assert_eq!(buf.to_vec(), vec![7]);
    }
}
