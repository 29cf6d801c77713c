//! SPSC sample ring — hands the rendered stereo stream to a push-model
//! output sink.
//!
//! The producer half lives with the render thread, the consumer half
//! inside the device callback. Both sides are wait-free; an underrun reads
//! as silence rather than ever blocking the callback. Pull-model sinks can
//! skip this and call [`crate::ToneEngine::render`] directly.

use ringbuf::traits::{Consumer as _, Observer as _, Producer as _, Split as _};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Render-thread half: writes interleaved stereo samples.
pub struct RingProducer {
    inner: HeapProd<f32>,
}

/// Device-callback half: reads interleaved stereo samples.
pub struct RingConsumer {
    inner: HeapCons<f32>,
}

/// Allocate a ring holding up to `capacity_frames` stereo frames.
pub fn sample_ring(capacity_frames: usize) -> (RingProducer, RingConsumer) {
    let rb = HeapRb::<f32>::new(capacity_frames.max(1) * 2);
    let (producer, consumer) = rb.split();
    (
        RingProducer { inner: producer },
        RingConsumer { inner: consumer },
    )
}

impl RingProducer {
    /// Append interleaved samples, returning how many were accepted. A
    /// full ring accepts fewer than `interleaved.len()`; the producer
    /// should back off and retry next block.
    pub fn push(&mut self, interleaved: &[f32]) -> usize {
        self.inner.push_slice(interleaved)
    }

    /// Samples the ring can currently accept.
    pub fn free_samples(&self) -> usize {
        self.inner.vacant_len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }
}

impl RingConsumer {
    /// Fill `out` from the ring; any shortfall is zeroed. Returns the
    /// number of samples actually read.
    pub fn fill(&mut self, out: &mut [f32]) -> usize {
        let read = self.inner.pop_slice(out);
        out[read..].fill(0.0);
        read
    }

    /// Samples currently buffered.
    pub fn buffered_samples(&self) -> usize {
        self.inner.occupied_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_samples_in_order() {
        let (mut producer, mut consumer) = sample_ring(16);
        let written: Vec<f32> = (0..8).map(|i| i as f32 / 10.0).collect();
        assert_eq!(producer.push(&written), 8);

        let mut out = vec![0.0f32; 8];
        assert_eq!(consumer.fill(&mut out), 8);
        assert_eq!(out, written);
    }

    #[test]
    fn underrun_reads_as_silence() {
        let (mut producer, mut consumer) = sample_ring(16);
        producer.push(&[0.5, -0.5]);

        let mut out = vec![1.0f32; 6];
        let read = consumer.fill(&mut out);
        assert_eq!(read, 2);
        assert_eq!(&out[..2], &[0.5, -0.5]);
        assert!(out[2..].iter().all(|&s| s == 0.0), "shortfall must be zeroed");
    }

    #[test]
    fn full_ring_accepts_partially() {
        let (mut producer, _consumer) = sample_ring(2);
        assert_eq!(producer.capacity(), 4);
        let accepted = producer.push(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(accepted, 4, "capacity is 2 frames = 4 samples");
        assert_eq!(producer.free_samples(), 0);
    }

    #[test]
    fn occupancy_tracks_push_and_fill() {
        let (mut producer, mut consumer) = sample_ring(8);
        producer.push(&[0.0; 10]);
        assert_eq!(consumer.buffered_samples(), 10);
        let mut out = [0.0f32; 4];
        consumer.fill(&mut out);
        assert_eq!(consumer.buffered_samples(), 6);
    }
}
