/// Why a batch was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushCause {
    /// Geometry capacity reached.
    GeometryFull,
    /// No free texture slot for the next quad.
    SlotsFull,
    /// `end_batch`.
    EndOfBatch,
    /// Caller asked for it.
    Explicit,
    /// Batch-of-one draw, or the pending batch flushed ahead of one.
    Immediate,
}

/// Flush counts per cause. Empty flushes are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushCauseCounts {
    pub geometry_full: u32,
    pub slots_full: u32,
    pub end_of_batch: u32,
    pub explicit: u32,
    pub immediate: u32,
}

impl FlushCauseCounts {
    pub fn record(&mut self, cause: FlushCause) {
        let counter = match cause {
            FlushCause::GeometryFull => &mut self.geometry_full,
            FlushCause::SlotsFull => &mut self.slots_full,
            FlushCause::EndOfBatch => &mut self.end_of_batch,
            FlushCause::Explicit => &mut self.explicit,
            FlushCause::Immediate => &mut self.immediate,
        };
        *counter += 1;
    }
}

/// Per-frame profiling counters. The owner resets them once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub quads_drawn: u32,
    /// Quads discarded because the batch could not be flushed.
    pub quads_dropped: u32,
    pub flushes_by_cause: FlushCauseCounts,
}

impl FrameStats {
    /// Average quads per draw call.
    pub fn quads_per_draw(&self) -> f32 {
        if self.draw_calls == 0 {
            0.0
        } else {
            self.quads_drawn as f32 / self.draw_calls as f32
        }
    }
}
