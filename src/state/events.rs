use tokio::sync::broadcast;

/// Fire-and-forget notifications emitted for the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// The game list changed and should be re-rendered.
    GamesUpdated,
    /// The player has exhausted their poem allotment.
    OutOfQuota,
    /// An entry submission was rolled back.
    WriteFailed,
    /// A vote was rolled back.
    VoteFailed,
    /// A topic submission (new round or new game) failed.
    TopicFailed,
    /// Quitting a game was rolled back.
    WithdrawFailed,
}

/// Broadcast hub fanning client events out to UI observers.
pub struct EventHub {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn notify(&self, event: ClientEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(16)
    }
}
