//! Rotation State - per-worker cursor over the queue list
//!
//! The cursor only ever moves forward by one position, either when the
//! current time slice expires or when an admitted queue turns out to be empty.
//! It is always reduced modulo the length of the snapshot it is applied to,
//! so queues appearing or disappearing between polls never push it out of
//! range.
//!
//! The slice deadline starts unset. The first expiry check pins it to "now",
//! which means a worker that has never reserved anything sees an expired slice
//! on every later check and advances once per poll. Only a reservation from a
//! *different* queue re-arms it to `now + slice_length`.

use crate::domain::QueueName;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationState {
    offset: usize,
    current_queue: Option<QueueName>,
    slice_deadline: Option<i64>,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh state whose cursor starts at `offset` instead of 0
    pub fn starting_at(offset: usize) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn current_queue(&self) -> Option<&str> {
        self.current_queue.as_deref()
    }

    pub fn slice_deadline(&self) -> Option<i64> {
        self.slice_deadline
    }

    /// `now > deadline`, pinning the deadline to `now` on first use
    pub fn slice_expired(&mut self, now_millis: i64) -> bool {
        let deadline = *self.slice_deadline.get_or_insert(now_millis);
        now_millis > deadline
    }

    /// Move the cursor one position forward within a snapshot of `len` queues
    pub fn advance(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.offset = (self.offset + 1) % len;
    }

    /// Probe order for this poll: `snapshot` rotated left by the cursor.
    ///
    /// Advances the cursor first when the slice has expired. An empty snapshot
    /// yields an empty order and leaves the state untouched.
    pub fn rotated_queues(&mut self, snapshot: &[QueueName], now_millis: i64) -> Vec<QueueName> {
        if snapshot.is_empty() {
            return Vec::new();
        }

        if self.slice_expired(now_millis) {
            self.advance(snapshot.len());
        }

        let mut rotated = snapshot.to_vec();
        rotated.rotate_left(self.offset % snapshot.len());
        rotated
    }

    /// Record a successful reservation from `queue`.
    ///
    /// Returns true when `queue` differs from the previous one, in which case
    /// the slice is re-armed. Repeated reservations from the same queue leave
    /// the deadline alone.
    pub fn record_reservation(&mut self, queue: &str, now_millis: i64, slice_millis: i64) -> bool {
        if self.current_queue.as_deref() == Some(queue) {
            return false;
        }
        self.slice_deadline = Some(now_millis.saturating_add(slice_millis));
        self.current_queue = Some(queue.to_string());
        true
    }
}
