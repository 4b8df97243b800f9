/// What a bed write does when its channel count, buffer or sample count is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BedGuardPolicy {
    /// Report success and queue nothing.
    #[default]
    Ignore,
    /// Report `InvalidParameter`.
    Reject,
}

/// Configuration descriptor for an Audio3D manager
#[derive(Debug, Clone, Default)]
pub struct Audio3dDesc {
    /// Outcome of bed writes that fail the channel/buffer/sample guard
    pub bed_guard_policy: BedGuardPolicy,
    /// Drop queued entries of an object when it is unreserved
    pub purge_queue_on_unreserve: bool,
}

impl Audio3dDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bed_guard_policy(mut self, policy: BedGuardPolicy) -> Self {
        self.bed_guard_policy = policy;
        self
    }

    pub fn purge_queue_on_unreserve(mut self, purge: bool) -> Self {
        self.purge_queue_on_unreserve = purge;
        self
    }
}
