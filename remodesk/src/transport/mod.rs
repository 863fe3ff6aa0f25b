use std::fmt;
use std::io;

use shared::error::Result;

use crate::description::SessionDescription;

/// Error reported by the signaling layer's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    /// The underlying transport dropped or could not be established.
    TransportFailed,
    /// The peer violated the signaling protocol.
    ProtocolViolation(String),
    /// The signaling exchange timed out.
    Timeout,
    Unknown(String),
}

impl fmt::Display for SignalingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalingError::TransportFailed => write!(f, "signaling transport failed"),
            SignalingError::ProtocolViolation(detail) => {
                write!(f, "signaling protocol violation: {detail}")
            }
            SignalingError::Timeout => write!(f, "signaling timed out"),
            SignalingError::Unknown(detail) => write!(f, "signaling error: {detail}"),
        }
    }
}

/// Opaque handle to one raw transport channel, produced by the signaling
/// layer and consumed by a channel connector.
pub trait RawChannel {
    fn name(&self) -> &str;
}

/// Authenticated, encrypted byte stream for the control, event and video
/// channels.
pub trait StreamSocket: io::Read + io::Write {}

/// Authenticated, encrypted packet socket for the RTP/RTCP channels.
pub trait DatagramSocket {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Socket produced by a completed channel connector.
pub enum ChannelSocket {
    Stream(Box<dyn StreamSocket>),
    Datagram(Box<dyn DatagramSocket>),
}

impl ChannelSocket {
    pub fn is_stream(&self) -> bool {
        matches!(self, ChannelSocket::Stream(_))
    }

    pub fn is_datagram(&self) -> bool {
        matches!(self, ChannelSocket::Datagram(_))
    }
}

impl fmt::Debug for ChannelSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSocket::Stream(_) => write!(f, "ChannelSocket::Stream"),
            ChannelSocket::Datagram(_) => write!(f, "ChannelSocket::Datagram"),
        }
    }
}

/// Interface to the external signaling/session transport.
///
/// The session core never touches the wire encoding; it consumes descriptions
/// and raw channel handles through this trait and reports nothing back except
/// `terminate`.
pub trait SignalingSession {
    /// Remote peer identifier, valid once signaling has started.
    fn remote_identity(&self) -> String;

    fn is_initiator(&self) -> bool;

    fn local_description(&self) -> Option<SessionDescription>;

    fn remote_description(&self) -> Option<SessionDescription>;

    /// Creates and returns the raw channel registered under
    /// `(content_name, channel_name)`.
    fn create_channel(
        &mut self,
        content_name: &str,
        channel_name: &str,
    ) -> Result<Box<dyn RawChannel>>;

    /// Forces connection of all channels registered for `content_name`.
    ///
    /// Channels created after the initial accept are not connected
    /// automatically, so every late registration must be followed by this
    /// call. Only valid once the signaling callback that triggered the
    /// channel creation has returned.
    fn connect_channels(&mut self, content_name: &str);

    /// Terminates the signaling session and detaches its event stream.
    fn terminate(&mut self);
}
