//! Bounded single-producer single-consumer sample queue
//!
//! Carries [`CompositeRecord`](crate::CompositeRecord)s from the acquisition
//! core to the storage core without locks: the write index is only stored by
//! the [`Producer`], the read index only by the [`Consumer`], and each side
//! publishes its index with release ordering after touching the slot.
//!
//! # Overflow
//!
//! The queue never reports "full". A push always writes the slot at the write
//! index and advances it, so a producer that outruns the consumer wraps around
//! and overwrites records that were never popped. Once the write index catches
//! up with the read index the queue looks empty again: pushing `N` records into
//! an `N`-slot ring without popping loses all of them, and pushing `N + 1`
//! leaves only the newest one readable. Size the ring so that the storage loop
//! drains it well before this happens.
//!
//! If the producer laps the consumer while the consumer is copying a slot out,
//! the popped record can mix fields of two samples.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Ring size used by the firmware
pub const DEFAULT_QUEUE_LEN: usize = 50;

/// Fixed-size ring of `N` slots holding at most `N - 1` unread records
pub struct SampleQueue<T, const N: usize> {
    slots: [UnsafeCell<T>; N],
    read: AtomicUsize,
    write: AtomicUsize,
}

// Producer and consumer live on different cores; each index has one writer.
unsafe impl<T: Copy + Send, const N: usize> Sync for SampleQueue<T, N> {}

impl<T, const N: usize> SampleQueue<T, N>
where
    T: Copy + Default,
{
    const VALID_LEN: () = assert!(N >= 2, "a ring needs at least two slots");

    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        let () = Self::VALID_LEN;
        Self {
            slots: core::array::from_fn(|_| UnsafeCell::new(T::default())),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    /// Maximum number of unread records before wraparound loses data
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Whether no record is waiting
    pub fn is_empty(&self) -> bool {
        self.read.load(Ordering::Acquire) == self.write.load(Ordering::Acquire)
    }

    /// Number of unread records
    pub fn len(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        (write + N - read) % N
    }

    /// Split into the producer and consumer halves
    ///
    /// The halves borrow the queue, so it must outlive both cores' use of it
    /// (on target, a `StaticCell`).
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let queue: &Self = self;
        (Producer { queue }, Consumer { queue })
    }
}

impl<T, const N: usize> Default for SampleQueue<T, N>
where
    T: Copy + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Writing half, owned by the acquisition context
pub struct Producer<'a, T, const N: usize> {
    queue: &'a SampleQueue<T, N>,
}

unsafe impl<T: Copy + Send, const N: usize> Send for Producer<'_, T, N> {}

impl<T, const N: usize> Producer<'_, T, N>
where
    T: Copy + Default,
{
    /// Append a record, overwriting the oldest unread one on wraparound
    pub fn push(&mut self, record: T) {
        let write = self.queue.write.load(Ordering::Relaxed);
        // SAFETY: only the producer writes slots; the consumer reads a slot only
        // while it sits between the published read and write indices.
        unsafe { core::ptr::write_volatile(self.queue.slots[write].get(), record) };
        self.queue.write.store((write + 1) % N, Ordering::Release);
    }

    /// Whether the consumer has caught up
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of unread records
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Maximum number of unread records before wraparound loses data
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

/// Reading half, owned by the storage context
pub struct Consumer<'a, T, const N: usize> {
    queue: &'a SampleQueue<T, N>,
}

unsafe impl<T: Copy + Send, const N: usize> Send for Consumer<'_, T, N> {}

impl<T, const N: usize> Consumer<'_, T, N>
where
    T: Copy + Default,
{
    /// Take the oldest unread record, or `None` if the indices are equal
    pub fn pop(&mut self) -> Option<T> {
        let read = self.queue.read.load(Ordering::Relaxed);
        if read == self.queue.write.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: the acquire load above orders this copy after the producer's
        // write of the slot.
        let record = unsafe { core::ptr::read_volatile(self.queue.slots[read].get()) };
        self.queue.read.store((read + 1) % N, Ordering::Release);
        Some(record)
    }

    /// Whether no record is waiting
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of unread records
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
