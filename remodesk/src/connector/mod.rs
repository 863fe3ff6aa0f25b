use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use shared::crypto::{ChannelKey, IdentityKeyPair};
use shared::error::Result;

use crate::constants::ChannelKind;
use crate::transport::RawChannel;

/// Everything a connector needs to turn a raw channel into an authenticated
/// socket.
pub struct ConnectParams {
    pub channel: ChannelKind,
    pub is_initiator: bool,
    /// DER certificate presented to the peer. Responder side only.
    pub local_certificate: Option<Bytes>,
    /// Peer's DER certificate to verify against. Initiator side only.
    pub remote_certificate: Option<Bytes>,
    /// Private identity backing the local certificate. Responder side only.
    pub local_identity: Option<IdentityKeyPair>,
    pub channel_key: ChannelKey,
    pub raw_channel: Box<dyn RawChannel>,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("channel", &self.channel)
            .field("is_initiator", &self.is_initiator)
            .field("channel_key", &self.channel_key)
            .finish()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectorFlavor {
    Stream,
    Datagram,
}

/// Asynchronous bring-up of one channel.
///
/// `connect` starts the handshake; the embedder reports the outcome back to
/// the session as a `ChannelConnected` or `ChannelFailed` event, exactly once
/// per connector.
pub trait ChannelConnector {
    fn flavor(&self) -> ConnectorFlavor;

    fn connect(&mut self, params: ConnectParams) -> Result<()>;
}

/// Produces connectors of the two flavors for a given channel.
pub trait ConnectorFactory {
    fn stream_connector(&mut self, channel: ChannelKind) -> Box<dyn ChannelConnector>;

    fn datagram_connector(&mut self, channel: ChannelKind) -> Box<dyn ChannelConnector>;
}

/// Owning arena of in-flight connectors, keyed by channel.
///
/// At most one connector per channel may be live; inserting a duplicate is a
/// programming fault. Removal returns ownership so the caller controls when
/// the connector is destroyed.
#[derive(Default)]
pub struct ConnectorRegistry {
    entries: HashMap<ChannelKind, Box<dyn ChannelConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        ConnectorRegistry::default()
    }

    /// # Panics
    ///
    /// Panics if a connector for `channel` is already registered.
    pub fn insert(&mut self, channel: ChannelKind, connector: Box<dyn ChannelConnector>) {
        assert!(
            !self.entries.contains_key(&channel),
            "duplicate connector registered for channel {channel}"
        );
        self.entries.insert(channel, connector);
    }

    pub fn remove(&mut self, channel: ChannelKind) -> Option<Box<dyn ChannelConnector>> {
        self.entries.remove(&channel)
    }

    pub fn contains(&self, channel: ChannelKind) -> bool {
        self.entries.contains_key(&channel)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Removes and returns every in-flight connector, for teardown.
    pub fn drain(&mut self) -> Vec<(ChannelKind, Box<dyn ChannelConnector>)> {
        self.entries.drain().collect()
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("channels", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
