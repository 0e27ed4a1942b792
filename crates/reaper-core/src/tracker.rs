//! Seen-instance tracker

use reaper_util::InstanceId;
use std::collections::HashSet;

/// Instance ids observed so far by this process.
///
/// Membership only grows. It decides whether a "new instance" line is
/// logged and nothing else; termination never consults it. Growth is
/// unbounded for the life of the process.
#[derive(Debug, Default)]
pub struct SeenTracker {
    seen: HashSet<InstanceId>,
}

impl SeenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation. Returns true the first time an id is seen.
    pub fn observe(&mut self, instance_id: &InstanceId) -> bool {
        if self.seen.contains(instance_id) {
            return false;
        }
        self.seen.insert(instance_id.clone())
    }

    pub fn contains(&self, instance_id: &InstanceId) -> bool {
        self.seen.contains(instance_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
