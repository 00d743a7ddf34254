use serde::Serialize;

use crate::error::SegmentationError;
use crate::machine::BoundaryEvent;

/// One contiguous stretch of a track, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub index: u32,
    pub start_ms: i64,
    pub duration_ms: i64,
}

impl Segment {
    pub fn end_ms(&self) -> i64 {
        self.start_ms + self.duration_ms
    }
}

/// Collects closed segments for one run and produces the final list.
pub struct SegmentAccumulator {
    duration: u32,
    segments: Vec<Segment>,
}

impl SegmentAccumulator {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            segments: Vec::new(),
        }
    }

    pub fn record(&mut self, event: BoundaryEvent) {
        match event {
            BoundaryEvent::SegmentClosed { index, start, end } => {
                self.segments.push(Segment {
                    index,
                    start_ms: secs_to_ms(start),
                    duration_ms: secs_to_ms(end) - secs_to_ms(start),
                });
            }
        }
    }

    /// Close the open segment at the end of the track and validate the list.
    pub fn finish(
        mut self,
        start_of_segment: u32,
        index: u32,
    ) -> Result<Vec<Segment>, SegmentationError> {
        self.record(BoundaryEvent::SegmentClosed {
            index,
            start: start_of_segment,
            end: self.duration,
        });
        validate(&self.segments, self.duration)?;
        Ok(self.segments)
    }
}

fn secs_to_ms(secs: u32) -> i64 {
    i64::from(secs) * 1000
}

/// Check that `segments` tile `[0, duration * 1000)` in index order.
pub fn validate(segments: &[Segment], duration: u32) -> Result<(), SegmentationError> {
    let violation = |msg: String| Err(SegmentationError::InvariantViolation(msg));

    let Some(first) = segments.first() else {
        return violation("no segments".into());
    };
    if first.start_ms != 0 {
        return violation(format!("first segment starts at {}ms", first.start_ms));
    }

    for (i, seg) in segments.iter().enumerate() {
        let expected_index = i as u32 + 1;
        if seg.index != expected_index {
            return violation(format!(
                "segment at position {i} has index {}, expected {expected_index}",
                seg.index
            ));
        }
        if seg.duration_ms < 0 {
            return violation(format!(
                "segment {} has negative duration {}ms",
                seg.index, seg.duration_ms
            ));
        }
        if let Some(next) = segments.get(i + 1) {
            if seg.end_ms() != next.start_ms {
                return violation(format!(
                    "segment {} ends at {}ms but segment {} starts at {}ms",
                    seg.index,
                    seg.end_ms(),
                    next.index,
                    next.start_ms
                ));
            }
        }
    }

    let end = segments[segments.len() - 1].end_ms();
    if end != secs_to_ms(duration) {
        return violation(format!(
            "last segment ends at {end}ms, track is {}ms",
            secs_to_ms(duration)
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(index: u32, start_ms: i64, duration_ms: i64) -> Segment {
        Segment {
            index,
            start_ms,
            duration_ms,
        }
    }

    fn closed(index: u32, start: u32, end: u32) -> BoundaryEvent {
        BoundaryEvent::SegmentClosed { index, start, end }
    }

    #[test]
    fn finish_appends_trailing_segment() {
        let mut acc = SegmentAccumulator::new(20);
        acc.record(closed(1, 0, 4));
        acc.record(closed(2, 4, 10));

        let segments = acc.finish(10, 3).unwrap();
        assert_eq!(
            segments,
            vec![seg(1, 0, 4000), seg(2, 4000, 6000), seg(3, 10000, 10000)]
        );
    }

    #[test]
    fn no_events_yields_whole_track() {
        let acc = SegmentAccumulator::new(7);
        assert_eq!(acc.finish(0, 1).unwrap(), vec![seg(1, 0, 7000)]);
    }

    #[test]
    fn zero_length_trailing_segment_is_allowed() {
        let mut acc = SegmentAccumulator::new(10);
        acc.record(closed(1, 0, 10));
        let segments = acc.finish(10, 2).unwrap();
        assert_eq!(segments[1], seg(2, 10000, 0));
    }

    #[test]
    fn gap_is_rejected() {
        let err = validate(&[seg(1, 0, 1000), seg(2, 2000, 1000)], 3).unwrap_err();
        assert!(matches!(err, SegmentationError::InvariantViolation(_)));
    }

    #[test]
    fn overlap_is_rejected() {
        assert!(validate(&[seg(1, 0, 2000), seg(2, 1000, 2000)], 3).is_err());
    }

    #[test]
    fn wrong_start_and_end_rejected() {
        assert!(validate(&[seg(1, 1000, 2000)], 3).is_err());
        assert!(validate(&[seg(1, 0, 2000)], 3).is_err());
        assert!(validate(&[], 3).is_err());
    }

    #[test]
    fn index_gaps_rejected() {
        assert!(validate(&[seg(1, 0, 1000), seg(3, 1000, 2000)], 3).is_err());
        assert!(validate(&[seg(0, 0, 3000)], 3).is_err());
    }

    #[test]
    fn negative_duration_rejected() {
        let err = validate(&[seg(1, 0, 3000), seg(2, 3000, -1000), seg(3, 2000, 1000)], 3);
        assert!(err.is_err());
    }
}
