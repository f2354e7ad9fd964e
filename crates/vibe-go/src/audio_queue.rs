use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Single-producer / single-consumer ring of stereo i16 frames.
///
/// The audio consumer thread writes whole buffers, the output callback (or
/// the drain thread) reads them back one frame at a time. Each frame is packed
/// into one `AtomicU32`, so neither side ever takes a lock.
///
/// Lossy when full: the frames that do not fit are dropped and counted.
pub struct RingWriter {
    inner: Arc<Ring>,
}

pub struct RingReader {
    inner: Arc<Ring>,
}

struct Ring {
    // One extra slot so head == tail is unambiguously empty.
    slots: Box<[AtomicU32]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicU64,
}

#[inline]
fn pack(left: i16, right: i16) -> u32 {
    ((left as u16 as u32) << 16) | right as u16 as u32
}

#[inline]
fn unpack(frame: u32) -> (i16, i16) {
    ((frame >> 16) as u16 as i16, frame as u16 as i16)
}

impl Ring {
    #[inline]
    fn next(&self, idx: usize) -> usize {
        let next = idx + 1;
        if next == self.slots.len() { 0 } else { next }
    }

    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head - tail
        } else {
            self.slots.len() - tail + head
        }
    }
}

pub fn sample_ring(capacity_frames: usize) -> (RingWriter, RingReader) {
    let slots = capacity_frames.saturating_add(1).max(2);
    let inner = Arc::new(Ring {
        slots: (0..slots).map(|_| AtomicU32::new(0)).collect(),
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
        dropped: AtomicU64::new(0),
    });

    (
        RingWriter {
            inner: Arc::clone(&inner),
        },
        RingReader { inner },
    )
}

impl RingWriter {
    /// Queue interleaved stereo samples. Returns the frames accepted.
    pub fn push_interleaved(&self, samples: &[i16]) -> usize {
        let ring = &self.inner;
        let mut head = ring.head.load(Ordering::Relaxed);
        let tail = ring.tail.load(Ordering::Acquire);
        let mut accepted = 0;

        for frame in samples.chunks_exact(2) {
            let next = ring.next(head);
            if next == tail {
                break;
            }
            ring.slots[head].store(pack(frame[0], frame[1]), Ordering::Relaxed);
            head = next;
            accepted += 1;
        }
        ring.head.store(head, Ordering::Release);

        let lost = samples.len() / 2 - accepted;
        if lost > 0 {
            ring.dropped.fetch_add(lost as u64, Ordering::Relaxed);
        }
        accepted
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity_frames(&self) -> usize {
        self.inner.slots.len() - 1
    }

    /// Frames lost to a full ring so far.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl RingReader {
    #[inline]
    pub fn pop_stereo(&self) -> Option<(i16, i16)> {
        let ring = &self.inner;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }

        let frame = ring.slots[tail].load(Ordering::Relaxed);
        ring.tail.store(ring.next(tail), Ordering::Release);
        Some(unpack(frame))
    }

    /// Pop up to `max` frames, discarding them. Returns how many were queued.
    pub fn skip(&self, max: usize) -> usize {
        let mut n = 0;
        while n < max && self.pop_stereo().is_some() {
            n += 1;
        }
        n
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
