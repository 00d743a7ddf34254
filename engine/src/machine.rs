use tracing::debug;
use vsegment_common::frame::Frame;

use crate::compare::FrameComparator;

/// Everything one run carries from one sample to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    /// Next second to sample.
    pub t: u32,
    /// Most recent second known to belong to settled content.
    pub last_stable_time: u32,
    /// Start (in seconds) of the segment currently open.
    pub start_of_segment: u32,
    /// Consecutive "same" samples, saturating at the stability window.
    pub stability_count: u32,
    /// A transition was seen and has not been confirmed stable yet.
    pub scene_change_imminent: bool,
    /// Baseline for the next comparison.
    pub previous_frame: Option<Frame>,
    /// Index the currently open segment will get when it closes.
    pub segment_index: u32,
}

impl RunState {
    /// State before the first sample. Scanning starts at second 1.
    pub fn initial() -> Self {
        Self {
            t: 1,
            last_stable_time: 1,
            start_of_segment: 0,
            stability_count: 0,
            scene_change_imminent: false,
            previous_frame: None,
            segment_index: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryEvent {
    /// Segment `index` covers `[start, end)` seconds.
    SegmentClosed { index: u32, start: u32, end: u32 },
}

/// The adaptive scanning state machine.
///
/// Settled content is skipped in coarse jumps of one stability window. When
/// a coarse jump lands on a changed frame the scan rewinds to the last
/// confirmed-stable second and walks forward one second at a time until
/// the new scene has been the same for a full window. The closing boundary
/// is backdated by the window length to make up for the confirmation delay.
#[derive(Debug, Clone)]
pub struct SegmentationMachine {
    comparator: FrameComparator,
    window: u32,
}

impl SegmentationMachine {
    pub fn new(comparator: FrameComparator, window: u32) -> Self {
        Self { comparator, window }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn comparator(&self) -> &FrameComparator {
        &self.comparator
    }

    /// Advance the run by one sample.
    ///
    /// `frame` is the frame sampled at `state.t`. Returns the next state and
    /// a boundary event when this sample confirmed one.
    pub fn step(&self, state: RunState, frame: Frame) -> (RunState, Option<BoundaryEvent>) {
        let differs = self
            .comparator
            .differs(state.previous_frame.as_ref(), &frame);

        if differs {
            (self.on_change(state, frame), None)
        } else {
            self.on_same(state, frame)
        }
    }

    fn on_change(&self, mut state: RunState, frame: Frame) -> RunState {
        let t = state.t;
        if !state.scene_change_imminent && t.saturating_sub(state.last_stable_time) > 1 {
            // Coarse jump overshot the transition: rescan from the last
            // stable second and keep the old baseline.
            debug!(t, rewind_to = state.last_stable_time, "coarse overshoot, rewinding");
            state.t = state.last_stable_time;
        } else {
            debug!(t, "transition started");
            state.last_stable_time = t.saturating_sub(1);
            state.previous_frame = Some(frame);
            state.t = t + 1;
        }
        state.stability_count = 0;
        state.scene_change_imminent = true;
        state
    }

    fn on_same(&self, mut state: RunState, frame: Frame) -> (RunState, Option<BoundaryEvent>) {
        let t = state.t;
        let mut event = None;

        if state.stability_count < self.window {
            state.stability_count += 1;
            if state.stability_count == self.window {
                state.last_stable_time = t;
                // Segments closing at or before second 1 are not emitted;
                // the open segment simply keeps its start.
                if let Some(end) = t.checked_sub(self.window).filter(|&end| end > 1) {
                    debug!(
                        index = state.segment_index,
                        start = state.start_of_segment,
                        end,
                        "stability confirmed, closing segment"
                    );
                    event = Some(BoundaryEvent::SegmentClosed {
                        index: state.segment_index,
                        start: state.start_of_segment,
                        end,
                    });
                    state.segment_index += 1;
                    state.start_of_segment = end;
                }
                state.t = t + self.window;
                state.scene_change_imminent = false;
            } else {
                state.t = t + 1;
            }
        } else if state.scene_change_imminent {
            state.last_stable_time = t;
            state.t = t + 1;
        } else {
            state.last_stable_time = t;
            state.t = t + self.window;
        }

        state.previous_frame = Some(frame);
        (state, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> SegmentationMachine {
        SegmentationMachine::new(FrameComparator::new(0.75, 0), 5)
    }

    fn a() -> Frame {
        Frame::filled(4, 4, [10, 10, 10])
    }

    fn b() -> Frame {
        Frame::filled(4, 4, [250, 250, 250])
    }

    fn state(t: u32) -> RunState {
        RunState {
            t,
            previous_frame: Some(a()),
            ..RunState::initial()
        }
    }

    #[test]
    fn first_sample_counts_as_same() {
        let (next, event) = machine().step(RunState::initial(), a());
        assert_eq!(event, None);
        assert_eq!(next.t, 2);
        assert_eq!(next.stability_count, 1);
        assert_eq!(next.previous_frame, Some(a()));
    }

    #[test]
    fn coarse_overshoot_rewinds_and_keeps_baseline() {
        let start = RunState {
            last_stable_time: 5,
            stability_count: 5,
            ..state(10)
        };
        let (next, event) = machine().step(start, b());
        assert_eq!(event, None);
        assert_eq!(next.t, 5);
        assert_eq!(next.last_stable_time, 5);
        assert_eq!(next.previous_frame, Some(a()));
        assert_eq!(next.stability_count, 0);
        assert!(next.scene_change_imminent);
    }

    #[test]
    fn change_during_fine_scan_is_accepted() {
        let start = RunState {
            last_stable_time: 5,
            scene_change_imminent: true,
            stability_count: 3,
            ..state(9)
        };
        let (next, _) = machine().step(start, b());
        assert_eq!(next.t, 10);
        assert_eq!(next.last_stable_time, 8);
        assert_eq!(next.previous_frame, Some(b()));
        assert_eq!(next.stability_count, 0);
        assert!(next.scene_change_imminent);
    }

    #[test]
    fn change_one_second_after_stable_is_accepted() {
        let start = RunState {
            last_stable_time: 6,
            ..state(7)
        };
        let (next, _) = machine().step(start, b());
        assert_eq!(next.t, 8);
        assert_eq!(next.last_stable_time, 6);
        assert_eq!(next.previous_frame, Some(b()));
    }

    #[test]
    fn same_before_window_fills_steps_by_one() {
        let start = RunState {
            stability_count: 2,
            ..state(3)
        };
        let (next, event) = machine().step(start, a());
        assert_eq!(event, None);
        assert_eq!(next.t, 4);
        assert_eq!(next.stability_count, 3);
    }

    #[test]
    fn confirmed_stability_closes_backdated_segment() {
        let start = RunState {
            stability_count: 4,
            scene_change_imminent: true,
            start_of_segment: 4,
            segment_index: 2,
            ..state(15)
        };
        let (next, event) = machine().step(start, a());
        assert_eq!(
            event,
            Some(BoundaryEvent::SegmentClosed {
                index: 2,
                start: 4,
                end: 10
            })
        );
        assert_eq!(next.start_of_segment, 10);
        assert_eq!(next.segment_index, 3);
        assert_eq!(next.last_stable_time, 15);
        assert_eq!(next.t, 20);
        assert!(!next.scene_change_imminent);
    }

    #[test]
    fn early_confirmation_does_not_close() {
        // end = 6 - 5 = 1, which is not past second 1
        let start = RunState {
            stability_count: 4,
            ..state(6)
        };
        let (next, event) = machine().step(start, a());
        assert_eq!(event, None);
        assert_eq!(next.start_of_segment, 0);
        assert_eq!(next.segment_index, 1);
        assert_eq!(next.t, 11);
        assert_eq!(next.last_stable_time, 6);
    }

    #[test]
    fn confirmation_before_window_elapsed_does_not_underflow() {
        let m = SegmentationMachine::new(FrameComparator::new(0.75, 0), 10);
        let start = RunState {
            stability_count: 9,
            ..state(3)
        };
        let (next, event) = m.step(start, a());
        assert_eq!(event, None);
        assert_eq!(next.t, 13);
    }

    #[test]
    fn saturated_and_imminent_steps_by_one() {
        let start = RunState {
            stability_count: 5,
            scene_change_imminent: true,
            ..state(12)
        };
        let (next, event) = machine().step(start, a());
        assert_eq!(event, None);
        assert_eq!(next.t, 13);
        assert_eq!(next.last_stable_time, 12);
        assert_eq!(next.stability_count, 5);
    }

    #[test]
    fn settled_content_jumps_coarsely() {
        let start = RunState {
            stability_count: 5,
            ..state(12)
        };
        let (next, event) = machine().step(start, a());
        assert_eq!(event, None);
        assert_eq!(next.t, 17);
        assert_eq!(next.last_stable_time, 12);
    }
}
