// Per-channel in-flight guard for image generation.

use dashmap::DashMap;
use std::sync::Arc;

/// Tracks channels that currently have an image being generated.
#[derive(Debug, Default, Clone)]
pub struct InFlight {
    channels: Arc<DashMap<u64, ()>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `channel_id`, or returns `None` if a job is already running there.
    pub fn try_begin(&self, channel_id: u64) -> Option<JobTicket> {
        use dashmap::mapref::entry::Entry;

        match self.channels.entry(channel_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(JobTicket {
                    channels: Arc::clone(&self.channels),
                    channel_id,
                })
            }
        }
    }

    pub fn is_busy(&self, channel_id: u64) -> bool {
        self.channels.contains_key(&channel_id)
    }
}

/// Releases the channel when dropped, even if the job panicked or errored.
#[derive(Debug)]
pub struct JobTicket {
    channels: Arc<DashMap<u64, ()>>,
    channel_id: u64,
}

impl Drop for JobTicket {
    fn drop(&mut self) {
        self.channels.remove(&self.channel_id);
    }
}
