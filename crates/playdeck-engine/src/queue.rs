//! Bounded queues of interleaved audio samples.
//!
//! [`SampleQueue`] is the hand-off between pipeline stages: the decode thread
//! pushes into one, the resampler pops from it and pushes into another, and
//! the output callback drains the final queue without ever blocking.
//! `close()` plus the draining pop semantics make shutdown deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Thread-safe bounded queue of interleaved `f32` samples.
///
/// Samples are stored interleaved (`frame0[ch0], frame0[ch1], ...`) and the
/// channel count is fixed for the queue's lifetime. The capacity bound caps
/// memory and latency; a single condvar doubles as the "state changed" signal
/// for producers and consumers. The closed flag lives under the same mutex as
/// the buffer so close/drain cannot race.
pub struct SampleQueue {
    channels: usize,
    inner: Mutex<QueueInner>,
    cv: Condvar,
    capacity_samples: usize,
}

struct QueueInner {
    buf: VecDeque<f32>,
    closed: bool,
}

/// Queue capacity in samples for a `(rate, channels, seconds)` buffering target.
///
/// Non-finite or non-positive `seconds` falls back to two seconds.
pub fn capacity_for(rate_hz: u32, channels: usize, seconds: f32) -> usize {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        2.0
    };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels)
}

impl SampleQueue {
    /// New queue bounded at `capacity_samples` samples (not frames).
    pub fn new(channels: usize, capacity_samples: usize) -> Self {
        Self {
            channels,
            inner: Mutex::new(QueueInner {
                buf: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
            capacity_samples,
        }
    }

    /// New queue sized for roughly `seconds` of audio at `rate_hz`.
    pub fn for_duration(channels: usize, rate_hz: u32, seconds: f32) -> Self {
        Self::new(channels, capacity_for(rate_hz, channels, seconds))
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Capacity in frames.
    pub fn capacity_frames(&self) -> usize {
        self.capacity_samples / self.channels
    }

    /// Buffered frames right now; may change as soon as this returns.
    pub fn len_frames(&self) -> usize {
        let g = self.inner.lock().unwrap();
        g.buf.len() / self.channels
    }

    /// Whether the producer has closed the queue. Buffered samples remain
    /// poppable after close until drained.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Close the queue and wake all waiters. Idempotent.
    ///
    /// Blocked pushes return early and drop their remaining samples; blocked
    /// pops return `None` once the buffer drains.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Push interleaved samples, blocking while the queue is full.
    ///
    /// Returns early if the queue is closed mid-push; the unsent tail is
    /// dropped. Accepts any slice length, though producers normally push
    /// whole frames.
    pub fn push_blocking(&self, samples: &[f32]) {
        let mut offset = 0;
        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();
            while g.buf.len() >= self.capacity_samples && !g.closed {
                g = self.cv.wait(g).unwrap();
            }
            if g.closed {
                return;
            }
            let mut pushed = false;
            while offset < samples.len() && g.buf.len() < self.capacity_samples {
                g.buf.push_back(samples[offset]);
                offset += 1;
                pushed = true;
            }
            drop(g);
            if pushed {
                self.cv.notify_all();
            }
        }
    }

    /// Block until exactly `frames` whole frames are available and pop them.
    ///
    /// Returns `None` if the queue closes before enough data arrives.
    pub fn pop_exact(&self, frames: usize) -> Option<Vec<f32>> {
        let want = frames * self.channels;
        let mut g = self.inner.lock().unwrap();
        while g.buf.len() < want && !g.closed {
            g = self.cv.wait(g).unwrap();
        }
        if g.buf.len() < want {
            return None;
        }
        let out = Self::take(&mut g, want);
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Block until at least one frame is available, then pop up to
    /// `max_frames`. Returns `None` once the queue is closed and empty.
    pub fn pop_up_to(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();
        while g.buf.is_empty() && !g.closed {
            g = self.cv.wait(g).unwrap();
        }
        if g.buf.is_empty() {
            return None;
        }
        let frames = (g.buf.len() / self.channels).min(max_frames);
        let out = Self::take(&mut g, frames * self.channels);
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Pop up to `max_frames` without blocking; `None` when no whole frame is
    /// buffered. Safe to call from the real-time output callback.
    pub fn try_pop(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();
        let frames = (g.buf.len() / self.channels).min(max_frames);
        if frames == 0 {
            return None;
        }
        let out = Self::take(&mut g, frames * self.channels);
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    fn take(g: &mut QueueInner, samples: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(samples);
        for _ in 0..samples {
            out.push(g.buf.pop_front().unwrap_or(0.0));
        }
        out
    }
}

/// Block until `q` is closed and empty, or `cancel` becomes true.
///
/// Returns `true` when the queue drained normally, `false` on cancel.
pub fn wait_drained_or_cancel(q: &Arc<SampleQueue>, cancel: &Arc<AtomicBool>) -> bool {
    let mut g = q.inner.lock().unwrap();
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        if g.closed && g.buf.is_empty() {
            return true;
        }
        let (ng, _timeout) = q.cv.wait_timeout(g, Duration::from_millis(50)).unwrap();
        g = ng;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn capacity_for_falls_back_on_bad_seconds() {
        assert_eq!(capacity_for(48_000, 2, 2.0), 192_000);
        assert_eq!(capacity_for(48_000, 2, -1.0), 192_000);
        assert_eq!(capacity_for(48_000, 2, f32::NAN), 192_000);
        assert_eq!(capacity_for(48_000, 2, f32::INFINITY), 192_000);
    }

    #[test]
    fn try_pop_on_empty_returns_none() {
        let q = SampleQueue::new(2, 16);
        assert!(q.try_pop(4).is_none());
    }

    #[test]
    fn try_pop_returns_only_whole_frames() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let out = q.try_pop(2).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(q.len_frames(), 1);
    }

    #[test]
    fn pop_exact_waits_for_full_request() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let producer = q.clone();
        let barrier = Arc::new(Barrier::new(2));
        let start = barrier.clone();

        let handle = thread::spawn(move || {
            start.wait();
            let out = q.pop_exact(3).unwrap();
            assert_eq!(out.len(), 6);
        });

        barrier.wait();
        producer.push_blocking(&[0.1, 0.2, 0.3, 0.4]);
        producer.push_blocking(&[0.5, 0.6]);
        handle.join().unwrap();
    }

    #[test]
    fn pop_exact_returns_none_when_closed_short() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0]);
        q.close();
        assert!(q.pop_exact(2).is_none());
    }

    #[test]
    fn pop_up_to_drains_tail_then_ends() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let consumer = q.clone();
        let barrier = Arc::new(Barrier::new(2));
        let start = barrier.clone();

        let handle = thread::spawn(move || {
            start.wait();
            let out = consumer.pop_up_to(8).unwrap();
            assert_eq!(out.len(), 4);
            assert!(consumer.pop_up_to(8).is_none());
        });

        barrier.wait();
        q.push_blocking(&[1.0, 2.0, 3.0, 4.0]);
        q.close();
        handle.join().unwrap();
    }

    #[test]
    fn push_returns_early_after_close() {
        let q = Arc::new(SampleQueue::new(1, 2));
        q.push_blocking(&[1.0, 2.0]);
        let full = q.clone();
        let handle = thread::spawn(move || {
            // Queue is full; this blocks until close, then drops the tail.
            full.push_blocking(&[3.0, 4.0]);
        });
        thread::sleep(Duration::from_millis(20));
        q.close();
        handle.join().unwrap();
        assert_eq!(q.len_frames(), 2);
    }

    #[test]
    fn wait_drained_or_cancel_reports_drain() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let cancel = Arc::new(AtomicBool::new(false));
        q.close();
        assert!(wait_drained_or_cancel(&q, &cancel));
    }

    #[test]
    fn wait_drained_or_cancel_reports_cancel() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let cancel = Arc::new(AtomicBool::new(true));
        q.push_blocking(&[1.0, 2.0]);
        assert!(!wait_drained_or_cancel(&q, &cancel));
    }
}
