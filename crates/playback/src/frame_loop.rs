/// Handle for one scheduled animation-frame callback.
///
/// Identifiers are handed out in increasing order and never reused, so a
/// cancelled request can never be confused with a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(u64);

impl FrameRequestId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Host-side animation-frame primitive.
///
/// Callers request a callback for the next display refresh and the host
/// drains due requests once per refresh with [`FrameLoop::take_due`].
/// Requests made while handling a batch land in the following batch.
#[derive(Debug, Default)]
pub struct FrameLoop {
    next_id: u64,
    pending: Vec<FrameRequestId>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a callback for the next refresh.
    pub fn request(&mut self) -> FrameRequestId {
        self.next_id += 1;
        let id = FrameRequestId(self.next_id);
        self.pending.push(id);
        id
    }

    /// Cancels a pending request. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: FrameRequestId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| *pending != id);
        self.pending.len() != before
    }

    /// Removes and returns every request due at this refresh, oldest first.
    pub fn take_due(&mut self) -> Vec<FrameRequestId> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_pending(&self, id: FrameRequestId) -> bool {
        self.pending.contains(&id)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
