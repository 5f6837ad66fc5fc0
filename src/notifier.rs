use crate::protocol::GameEvent;
use crate::types::PlayerId;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Per-player delivery seam. The session never reaches into a global
/// user registry; everything outward goes through this trait, which
/// keeps sessions independent and testable in isolation.
pub trait Notifier: Send + Sync + 'static {
    /// Deliver one event to one player. Must not block; whether the
    /// player is still connected is the transport's problem.
    fn send(&self, to: &PlayerId, event: GameEvent);
}

/// Channel-backed fanout: one unbounded sender per player. Events for a
/// player whose receiver is gone are dropped silently.
#[derive(Default)]
pub struct ChannelNotifier {
    senders: HashMap<PlayerId, mpsc::UnboundedSender<GameEvent>>,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player, returning the receiving half for the transport
    /// layer to drain.
    pub fn register(&mut self, id: PlayerId) -> mpsc::UnboundedReceiver<GameEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(id, tx);
        rx
    }
}

impl Notifier for ChannelNotifier {
    fn send(&self, to: &PlayerId, event: GameEvent) {
        if let Some(tx) = self.senders.get(to) {
            let _ = tx.send(event);
        }
    }
}
