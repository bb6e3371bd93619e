use super::*;

/// Where a pool connection stands. `Subscribed` means the line channel is open but the pool
/// has not accepted our login, either because we have not sent it yet or because the pool
/// forgot our session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum SessionState {
    #[default]
    #[display("disconnected")]
    Disconnected,
    #[display("connecting")]
    Connecting,
    #[display("subscribed")]
    Subscribed,
    #[display("authorized")]
    Authorized,
    #[display("ready")]
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connect,
    Connected,
    LoggedIn,
    WorkReady,
    AuthLost,
    Failed,
}

impl SessionState {
    /// Total transition function. Events that make no sense in the current state drop the
    /// connection.
    pub fn on(self, event: SessionEvent) -> Self {
        use {SessionEvent::*, SessionState::*};

        match (self, event) {
            (_, Failed) => Disconnected,
            (Disconnected, Connect) => Connecting,
            (Connecting, Connected) => Subscribed,
            (Subscribed, LoggedIn) => Authorized,
            (Authorized | Ready, WorkReady) => Ready,
            (Authorized | Ready, AuthLost) => Subscribed,
            _ => Disconnected,
        }
    }

    pub fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized | Self::Ready)
    }
}
