use std::io::Write;

use crate::{
    dispatch::{ActionTable, OutputSink},
    error::{MalformedStreamError, PipelineError},
    event::Frame,
    gesture::{GestureConfig, GestureEvent, GestureMatcher},
    trace::TraceWriter,
    tracker::{ContactTracker, GestureCandidate},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub candidates: Vec<GestureCandidate>,
    pub gestures: Vec<GestureEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub candidates: u64,
    pub gestures: Vec<GestureEvent>,
}

/// Source-agnostic processing loop: tracker, matcher and dispatcher over one
/// frame at a time.
pub struct Pipeline {
    tracker: ContactTracker,
    matcher: GestureMatcher,
    actions: ActionTable,
}

impl Pipeline {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            tracker: ContactTracker::new(),
            matcher: GestureMatcher::new(config),
            actions: ActionTable::from_config(config),
        }
    }

    pub fn tracker(&self) -> &ContactTracker {
        &self.tracker
    }

    pub fn matcher(&self) -> &GestureMatcher {
        &self.matcher
    }

    /// Runs one frame to completion, dispatching every gesture it completes.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        sink: &mut dyn OutputSink,
    ) -> Result<FrameOutcome, PipelineError> {
        let candidates = self.tracker.apply(frame);
        let mut gestures = Vec::new();
        for candidate in &candidates {
            log::trace!(
                "candidate slot={} down=({},{})@{:?} up=({},{})@{:?}",
                candidate.slot,
                candidate.down_x,
                candidate.down_y,
                candidate.down_at,
                candidate.up_x,
                candidate.up_y,
                candidate.up_at
            );
            if let Some(gesture) = self.matcher.observe(candidate) {
                self.actions.dispatch(&gesture, sink)?;
                gestures.push(gesture);
            }
        }
        Ok(FrameOutcome {
            candidates,
            gestures,
        })
    }

    /// Drains `frames`, optionally recording each one before it is processed.
    /// Stops at the first error.
    pub fn run<I, W>(
        &mut self,
        frames: I,
        sink: &mut dyn OutputSink,
        mut recorder: Option<&mut TraceWriter<W>>,
    ) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = Result<Frame, MalformedStreamError>>,
        W: Write,
    {
        let mut summary = RunSummary::default();
        for frame in frames {
            let frame = frame?;
            if let Some(recorder) = recorder.as_deref_mut() {
                recorder
                    .write_frame(&frame)
                    .map_err(PipelineError::Record)?;
            }
            let outcome = self.process_frame(&frame, sink)?;
            summary.frames += 1;
            summary.candidates += outcome.candidates.len() as u64;
            summary.gestures.extend(outcome.gestures);
        }
        log::info!(
            "processed {} frames, {} contacts, {} gestures",
            summary.frames,
            summary.candidates,
            summary.gestures.len()
        );
        Ok(summary)
    }
}
