//! a fixed-capacity ring of `Measurement`s shared between producer threads
//!
//! The buffer knows nothing about time. It appends at the head, drops from
//! the tail when asked, and lets readers walk the live entries oldest to
//! newest. One slot is always left empty, so a buffer built with capacity
//! `C` holds at most `C - 1` measurements.
//!
//! Cursors are monotonic sequence numbers; slot `i` lives at `i % C`. All
//! cursor and slot mutation happens under a single mutex, so a reader never
//! observes a slot that is being rewritten.

use common::lock;
use data::Measurement;
use error::Error;
use std::sync::Mutex;

struct Ring {
    slots: Vec<Option<Measurement>>,
    // sequence number of the next write
    head: u64,
    // sequence number of the oldest live entry
    tail: u64,
}

impl Ring {
    fn len(&self) -> usize {
        (self.head - self.tail) as usize
    }

    fn slot(&self, seq: u64) -> usize {
        (seq % self.slots.len() as u64) as usize
    }

    fn oldest(&self) -> Option<Measurement> {
        if self.head == self.tail {
            return None;
        }
        self.slots[self.slot(self.tail)]
    }

    fn pop(&mut self) -> Option<Measurement> {
        if self.head == self.tail {
            return None;
        }
        let slot = self.slot(self.tail);
        self.tail += 1;
        self.slots[slot].take()
    }
}

/// a bounded, thread-safe window of measurements
pub struct WindowBuffer {
    capacity: usize,
    ring: Mutex<Ring>,
}

impl WindowBuffer {
    /// create a buffer with `capacity` slots, holding up to `capacity - 1`
    /// measurements
    pub fn new(capacity: usize) -> Result<WindowBuffer, Error> {
        if capacity < 2 {
            return Err(Error::InvalidArgument("buffer capacity must be at least 2"));
        }
        Ok(WindowBuffer {
            capacity: capacity,
            ring: Mutex::new(Ring {
                slots: vec![None; capacity],
                head: 0,
                tail: 0,
            }),
        })
    }

    /// the slot count the buffer was built with
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// number of live measurements
    pub fn len(&self) -> usize {
        lock(&self.ring).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity - 1
    }

    /// append a measurement, returns false without blocking if the buffer is full
    pub fn add(&self, measurement: Measurement) -> bool {
        let mut ring = lock(&self.ring);
        if ring.len() >= self.capacity - 1 {
            return false;
        }
        let slot = ring.slot(ring.head);
        ring.slots[slot] = Some(measurement);
        ring.head += 1;
        true
    }

    /// drop the oldest live measurement and return it
    pub fn advance(&self) -> Option<Measurement> {
        lock(&self.ring).pop()
    }

    /// drop the oldest live measurement only if `predicate` accepts it
    ///
    /// the check and the eviction happen under one lock, so concurrent callers
    /// can never evict an entry the predicate would have kept
    pub fn advance_if<F>(&self, predicate: F) -> Option<Measurement>
        where F: FnOnce(&Measurement) -> bool
    {
        let mut ring = lock(&self.ring);
        let evict = match ring.oldest() {
            Some(ref m) => predicate(m),
            None => false,
        };
        if evict { ring.pop() } else { None }
    }

    /// the oldest live measurement
    pub fn oldest(&self) -> Option<Measurement> {
        lock(&self.ring).oldest()
    }

    /// a lazy walk over the entries live at the time of the call, oldest first
    ///
    /// entries evicted while the walk is in progress are skipped, entries added
    /// after the call are not visited
    pub fn iter(&self) -> Iter {
        let ring = lock(&self.ring);
        Iter {
            buffer: self,
            next: ring.tail,
            end: ring.head,
        }
    }

    /// copy every live entry out under a single lock
    pub fn snapshot(&self) -> Vec<Measurement> {
        let ring = lock(&self.ring);
        (ring.tail..ring.head)
            .filter_map(|seq| ring.slots[ring.slot(seq)])
            .collect()
    }
}

/// iterator returned by `WindowBuffer::iter`
#[derive(Clone)]
pub struct Iter<'a> {
    buffer: &'a WindowBuffer,
    next: u64,
    end: u64,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Measurement;

    fn next(&mut self) -> Option<Measurement> {
        let ring = lock(&self.buffer.ring);
        if self.next < ring.tail {
            self.next = ring.tail;
        }
        if self.next >= self.end {
            return None;
        }
        let measurement = ring.slots[ring.slot(self.next)];
        self.next += 1;
        measurement
    }
}
