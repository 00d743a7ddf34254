use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::debug;
use vsegment_common::frame::Frame;

use super::{FrameSampler, SampleError};

/// Keeps the most recently decoded frames keyed by second.
///
/// A rewind re-samples seconds that were decoded moments earlier; serving
/// them from memory saves a seek+decode each. Results are identical with
/// or without the cache.
pub struct CachingSampler<S> {
    inner: S,
    cache: LruCache<u32, Frame>,
    hits: u64,
    misses: u64,
}

impl<S: FrameSampler> CachingSampler<S> {
    pub fn new(inner: S, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

}

impl<S: FrameSampler> FrameSampler for CachingSampler<S> {
    fn sample(&mut self, t: u32) -> Result<Frame, SampleError> {
        if let Some(frame) = self.cache.get(&t) {
            self.hits += 1;
            debug!(t, hits = self.hits, misses = self.misses, "frame cache hit");
            return Ok(frame.clone());
        }

        self.misses += 1;
        let frame = self.inner.sample(t)?;
        self.cache.put(t, frame.clone());
        Ok(frame)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<S> Drop for CachingSampler<S> {
    fn drop(&mut self) {
        debug!(hits = self.hits, misses = self.misses, "frame cache dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Counts calls and fails on a chosen second.
    struct Counting {
        calls: Arc<AtomicU32>,
        fail_at: Option<u32>,
    }

    impl FrameSampler for Counting {
        fn sample(&mut self, t: u32) -> Result<Frame, SampleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(t) == self.fail_at {
                return Err(SampleError::Ffmpeg("boom".into()));
            }
            Ok(Frame::filled(2, 2, [t as u8, 0, 0]))
        }
    }

    fn cached(capacity: usize, fail_at: Option<u32>) -> (CachingSampler<Counting>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let inner = Counting {
            calls: calls.clone(),
            fail_at,
        };
        let capacity = NonZeroUsize::new(capacity).unwrap();
        (CachingSampler::new(inner, capacity), calls)
    }

    #[test]
    fn repeated_second_served_from_cache() {
        let (mut sampler, calls) = cached(4, None);
        let first = sampler.sample(7).unwrap();
        let second = sampler.sample(7).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let (mut sampler, calls) = cached(2, None);
        sampler.sample(1).unwrap();
        sampler.sample(2).unwrap();
        sampler.sample(3).unwrap();
        sampler.sample(1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 3 is still cached
        sampler.sample(3).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn errors_are_not_cached() {
        let (mut sampler, calls) = cached(4, Some(5));
        assert!(sampler.sample(5).is_err());
        assert!(sampler.sample(5).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
