use std::fmt;

use crate::constants::ChannelKind;
use crate::transport::{ChannelSocket, SignalingError};

/// Signaling-layer notifications, mapped by the embedder from its wire
/// protocol into this fixed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    InitiateSent,
    InitiateReceived,
    AcceptSent,
    AcceptReceived,
    TerminateSent,
    TerminateReceived,
    RejectSent,
    RejectReceived,
    Error(SignalingError),
}

/// Single inbound event queue of the session state machine.
///
/// Signaling notifications and connector completions arrive through the same
/// funnel, so the closed-session guard lives in exactly one place.
pub enum SessionEvent {
    Signaling(SignalingEvent),
    /// A connector finished successfully and produced a socket.
    ChannelConnected {
        channel: ChannelKind,
        socket: ChannelSocket,
    },
    /// A connector finished with a failure.
    ChannelFailed {
        channel: ChannelKind,
    },
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Signaling(event) => write!(f, "Signaling({event:?})"),
            SessionEvent::ChannelConnected { channel, .. } => {
                write!(f, "ChannelConnected({channel})")
            }
            SessionEvent::ChannelFailed { channel } => write!(f, "ChannelFailed({channel})"),
        }
    }
}

/// Work the initiate handler schedules for the next scheduler turn.
///
/// Channel creation requires the signaling callback that triggered it to have
/// returned, so these transitions never run inline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Initiator: move to `Connecting` after the initiate went out.
    EnterConnecting,
    /// Responder: consult the host's accept gate for the inbound session.
    AcceptIncoming,
}
