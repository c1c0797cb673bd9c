use tokio::sync::broadcast;
use tracing::trace;

use relay_shared::AssistantReply;

const CHANNEL_CAPACITY: usize = 64;

/// Fan-out of "assistant produced a reply" events.
///
/// Dropping a receiver is the unsubscribe.
#[derive(Clone)]
pub struct HostEvents {
    tx: broadcast::Sender<AssistantReply>,
}

impl HostEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssistantReply> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers saw the event.
    pub fn publish(&self, reply: AssistantReply) -> usize {
        match self.tx.send(reply) {
            Ok(n) => n,
            Err(_) => {
                trace!("assistant reply published with no subscribers");
                0
            }
        }
    }
}

impl Default for HostEvents {
    fn default() -> Self {
        Self::new()
    }
}
