//! Byte-offset to capture-timestamp index.
//!
//! Built once while the server-direction payloads are concatenated,
//! then queried by the frame pacer with monotonically non-decreasing
//! offsets, once per decoded protocol message.

/// One breakpoint: the cumulative stream offset at which a recorded
/// message began, and that message's capture timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub offset: usize,
    pub timestamp_ms: u32,
}

/// Ordered list of `(offset, timestamp)` breakpoints over the
/// concatenated server stream. Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct TimelineIndex {
    breakpoints: Vec<Breakpoint>,
}

impl TimelineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a breakpoint. Offsets must be pushed in non-decreasing
    /// order (they are cumulative stream positions).
    pub fn push(&mut self, offset: usize, timestamp_ms: u32) {
        self.breakpoints.push(Breakpoint {
            offset,
            timestamp_ms,
        });
    }

    /// Timestamp of the latest breakpoint with `offset <= pos`, or 0
    /// when no breakpoint qualifies.
    ///
    /// A linear scan is fine here: this runs once per protocol
    /// message, not per byte.
    pub fn lookup(&self, pos: usize) -> u32 {
        let mut timestamp = 0;
        for bp in &self.breakpoints {
            if bp.offset > pos {
                break;
            }
            timestamp = bp.timestamp_ms;
        }
        timestamp
    }

    /// Timestamp of the last breakpoint (total capture duration)
    pub fn duration_ms(&self) -> u32 {
        self.breakpoints.last().map_or(0, |bp| bp.timestamp_ms)
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }
}
