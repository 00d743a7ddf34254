use tracing::{debug, warn};
use vsegment_common::frame::Frame;

/// Classifies two frames as "same" or "different" by the fraction of
/// pixels that changed between them.
///
/// A pixel counts as changed when any of its channels moved by more than
/// `pixel_tolerance`. The frames differ when the changed fraction is
/// strictly greater than `change_threshold`; a fraction exactly at the
/// threshold is still "same".
#[derive(Debug, Clone)]
pub struct FrameComparator {
    change_threshold: f64,
    pixel_tolerance: u8,
}

impl FrameComparator {
    pub fn new(change_threshold: f64, pixel_tolerance: u8) -> Self {
        Self {
            change_threshold,
            pixel_tolerance,
        }
    }

    pub fn change_threshold(&self) -> f64 {
        self.change_threshold
    }

    /// Returns `true` if `current` belongs to a different scene than `previous`.
    ///
    /// Without a previous frame there is nothing to differ from: the first
    /// sample of a run establishes the baseline and is reported as "same".
    pub fn differs(&self, previous: Option<&Frame>, current: &Frame) -> bool {
        let Some(previous) = previous else {
            debug!("first frame, establishing baseline");
            return false;
        };

        if previous.width() != current.width() || previous.height() != current.height() {
            warn!(
                from_width = previous.width(),
                from_height = previous.height(),
                to_width = current.width(),
                to_height = current.height(),
                "resolution change detected"
            );
            return true;
        }

        let total = current.pixel_count();
        if total == 0 {
            return false;
        }

        let changed = self.count_changed(previous, current, Some(self.change_limit(total)));
        let fraction = changed as f64 / total as f64;
        let differs = fraction > self.change_threshold;
        debug!(
            changed,
            total,
            fraction = format!("{:.4}", fraction),
            threshold = self.change_threshold,
            differs,
            "frame comparison"
        );
        differs
    }

    /// Fraction of pixels that changed between two equally sized frames.
    /// Frames of different sizes are considered fully changed.
    pub fn changed_fraction(&self, a: &Frame, b: &Frame) -> f64 {
        if a.width() != b.width() || a.height() != b.height() {
            return 1.0;
        }
        let total = a.pixel_count();
        if total == 0 {
            return 0.0;
        }
        self.count_changed(a, b, None) as f64 / total as f64
    }

    /// Smallest changed-pixel count whose fraction exceeds the threshold.
    /// Once the running count reaches it the outcome can no longer change.
    fn change_limit(&self, total: usize) -> usize {
        let mut limit = (self.change_threshold * total as f64).floor() as usize;
        while limit <= total && (limit as f64 / total as f64) <= self.change_threshold {
            limit += 1;
        }
        limit
    }

    fn count_changed(&self, a: &Frame, b: &Frame, stop_at: Option<usize>) -> usize {
        let tolerance = self.pixel_tolerance;
        let mut changed = 0usize;
        for (pa, pb) in a.pixels().zip(b.pixels()) {
            let delta = pa
                .iter()
                .zip(pb.iter())
                .map(|(&x, &y)| x.abs_diff(y))
                .max()
                .unwrap_or(0);
            if delta > tolerance {
                changed += 1;
                if stop_at.is_some_and(|limit| changed >= limit) {
                    break;
                }
            }
        }
        changed
    }
}
