//! Broadcast adapter publishing joints on a tokio broadcast channel.

use shared_types::Joint;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::ports::JointBroadcaster;

/// Default channel capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Fan-out of composed joints to in-process subscribers (peer writers).
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<Joint>,
    published: AtomicU64,
}

impl ChannelBroadcaster {
    /// Channel holding up to `capacity` unread joints per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// New subscriber; sees joints published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Joint> {
        self.sender.subscribe()
    }

    /// Joints published so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl JointBroadcaster for ChannelBroadcaster {
    fn broadcast_joint(&self, joint: &Joint) {
        self.published.fetch_add(1, Ordering::SeqCst);
        // No subscribers is not an error for fire-and-forget publication.
        if let Ok(receivers) = self.sender.send(joint.clone()) {
            tracing::debug!(
                unit = joint.unit_hash().unwrap_or_default(),
                receivers,
                "[composer] Joint broadcast"
            );
        }
    }
}
