pub mod event;
pub mod state;

use std::marker::PhantomData;
use std::rc::Rc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use shared::crypto::{
    self, IdentityKeyPair, MasterKey, PeerPublicKey, SealedMasterKey,
};
use shared::error::{Error, Result};

use crate::config::{CandidateSessionConfig, SessionConfig};
use crate::connector::{ConnectParams, ConnectorFactory, ConnectorRegistry};
use crate::constants::{ChannelKind, CONTENT_NAME, CONTENT_NAMESPACE};
use crate::description::ContentDescription;
use crate::transport::{ChannelSocket, SignalingSession};

pub use event::{DeferredAction, SessionEvent, SignalingEvent};
pub use state::SessionState;

/// Callback invoked with each state change, replaceable, suppressed once the
/// session has closed.
pub type StateObserver = Box<dyn FnMut(SessionState)>;

/// Role of this endpoint, fixed for the session's lifetime. Each variant
/// carries only the material that role owns.
pub enum SessionRole {
    /// Client side: knows the host's public identity ahead of time, learns
    /// the host's certificate during negotiation.
    Initiator {
        peer_public_key: PeerPublicKey,
        remote_certificate: Option<Bytes>,
    },
    /// Host side: presents a certificate backed by its private identity.
    Responder {
        local_certificate: Bytes,
        local_identity: IdentityKeyPair,
    },
}

impl SessionRole {
    pub fn is_initiator(&self) -> bool {
        matches!(self, SessionRole::Initiator { .. })
    }

    pub fn local_certificate(&self) -> Option<&Bytes> {
        match self {
            SessionRole::Initiator { .. } => None,
            SessionRole::Responder {
                local_certificate, ..
            } => Some(local_certificate),
        }
    }

    pub fn remote_certificate(&self) -> Option<&Bytes> {
        match self {
            SessionRole::Initiator {
                remote_certificate, ..
            } => remote_certificate.as_ref(),
            SessionRole::Responder { .. } => None,
        }
    }

    pub fn local_identity(&self) -> Option<&IdentityKeyPair> {
        match self {
            SessionRole::Initiator { .. } => None,
            SessionRole::Responder { local_identity, .. } => Some(local_identity),
        }
    }

    pub fn peer_public_key(&self) -> Option<&PeerPublicKey> {
        match self {
            SessionRole::Initiator {
                peer_public_key, ..
            } => Some(peer_public_key),
            SessionRole::Responder { .. } => None,
        }
    }

    fn set_remote_certificate(&mut self, certificate: Bytes) {
        match self {
            SessionRole::Initiator {
                remote_certificate, ..
            } => *remote_certificate = Some(certificate),
            SessionRole::Responder { .. } => {
                panic!("remote certificate stored on responder role")
            }
        }
    }
}

#[derive(Default)]
struct ChannelSockets {
    control: Option<ChannelSocket>,
    event: Option<ChannelSocket>,
    video: Option<ChannelSocket>,
    video_rtp: Option<ChannelSocket>,
    video_rtcp: Option<ChannelSocket>,
}

impl ChannelSockets {
    fn slot_mut(&mut self, channel: ChannelKind) -> &mut Option<ChannelSocket> {
        match channel {
            ChannelKind::Control => &mut self.control,
            ChannelKind::Event => &mut self.event,
            ChannelKind::Video => &mut self.video,
            ChannelKind::VideoRtp => &mut self.video_rtp,
            ChannelKind::VideoRtcp => &mut self.video_rtcp,
        }
    }

    fn slot(&self, channel: ChannelKind) -> &Option<ChannelSocket> {
        match channel {
            ChannelKind::Control => &self.control,
            ChannelKind::Event => &self.event,
            ChannelKind::Video => &self.video,
            ChannelKind::VideoRtp => &self.video_rtp,
            ChannelKind::VideoRtcp => &self.video_rtcp,
        }
    }

    fn all_connected(&self) -> bool {
        self.control.is_some()
            && self.event.is_some()
            && self.video.is_some()
            && self.video_rtp.is_some()
            && self.video_rtcp.is_some()
    }

    fn clear(&mut self) {
        *self = ChannelSockets::default();
    }
}

/// One negotiated, authenticated logical connection between two peers,
/// multiplexing the five fixed sub-channels.
///
/// The session is sans-io and single-threaded: the embedder's scheduler
/// feeds inbound events through [`Session::handle_event`], runs deferred
/// transitions via [`Session::dispatch_deferred`], and drives the optional
/// bring-up deadline through [`Session::poll_timeout`] /
/// [`Session::handle_timeout`]. All mutation flows through `&mut self`;
/// the type is deliberately not `Send`.
pub struct Session {
    role: SessionRole,
    state: SessionState,

    signaling: Option<Box<dyn SignalingSession>>,
    connector_factory: Box<dyn ConnectorFactory>,

    remote_identity: Option<String>,
    master_key: Option<MasterKey>,
    sealed_master_key: Option<SealedMasterKey>,
    candidate_config: Option<CandidateSessionConfig>,
    config: Option<SessionConfig>,
    initiator_token: Option<String>,
    receiver_token: Option<String>,

    connectors: ConnectorRegistry,
    sockets: ChannelSockets,

    observer: Option<StateObserver>,
    deferred: Option<DeferredAction>,

    closing: bool,
    closed: bool,
    error: Option<Error>,

    bringup_timeout: Option<Duration>,
    bringup_deadline: Option<Instant>,

    // Pins the session to the embedder's scheduler thread.
    _scheduler_affinity: PhantomData<Rc<()>>,
}

impl Session {
    /// Creates the client-side session. Generates the master key and seals it
    /// to the host's pre-shared public identity.
    pub fn new_initiator(
        candidate_config: CandidateSessionConfig,
        peer_public_key: PeerPublicKey,
        connector_factory: Box<dyn ConnectorFactory>,
    ) -> Result<Self> {
        let master_key = MasterKey::generate();
        let sealed_master_key = crypto::seal_master_key(&peer_public_key, &master_key)?;

        let mut session = Session::with_role(
            SessionRole::Initiator {
                peer_public_key,
                remote_certificate: None,
            },
            connector_factory,
        );
        session.master_key = Some(master_key);
        session.sealed_master_key = Some(sealed_master_key);
        session.candidate_config = Some(candidate_config);
        Ok(session)
    }

    /// Creates the host-side session. The master key is recovered from the
    /// initiator's sealed blob when the initiate arrives.
    pub fn new_responder(
        local_certificate: Bytes,
        local_identity: IdentityKeyPair,
        connector_factory: Box<dyn ConnectorFactory>,
    ) -> Self {
        Session::with_role(
            SessionRole::Responder {
                local_certificate,
                local_identity,
            },
            connector_factory,
        )
    }

    fn with_role(role: SessionRole, connector_factory: Box<dyn ConnectorFactory>) -> Self {
        Session {
            role,
            state: SessionState::Initializing,
            signaling: None,
            connector_factory,
            remote_identity: None,
            master_key: None,
            sealed_master_key: None,
            candidate_config: None,
            config: None,
            initiator_token: None,
            receiver_token: None,
            connectors: ConnectorRegistry::new(),
            sockets: ChannelSockets::default(),
            observer: None,
            deferred: None,
            closing: false,
            closed: false,
            error: None,
            bringup_timeout: None,
            bringup_deadline: None,
            _scheduler_affinity: PhantomData,
        }
    }

    /// Attaches the signaling session this session negotiates over.
    pub fn init(&mut self, signaling: Box<dyn SignalingSession>) {
        self.signaling = Some(signaling);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> &SessionRole {
        &self.role
    }

    /// Error that drove the session to `Failed`, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn remote_identity(&self) -> Option<&str> {
        self.remote_identity.as_deref()
    }

    /// Master key sealed for the peer; present on the initiator, carried in
    /// its initiate description.
    pub fn sealed_master_key(&self) -> Option<&SealedMasterKey> {
        self.sealed_master_key.as_ref()
    }

    pub fn candidate_config(&self) -> Option<&CandidateSessionConfig> {
        self.candidate_config.as_ref()
    }

    /// Negotiated configuration; set exactly once per session.
    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    pub fn initiator_token(&self) -> Option<&str> {
        self.initiator_token.as_deref()
    }

    pub fn receiver_token(&self) -> Option<&str> {
        self.receiver_token.as_deref()
    }

    /// # Panics
    ///
    /// Panics if a token is already set; tokens are write-once.
    pub fn set_initiator_token(&mut self, token: String) {
        assert!(self.initiator_token.is_none(), "initiator token set twice");
        self.initiator_token = Some(token);
    }

    /// # Panics
    ///
    /// Panics if a token is already set; tokens are write-once.
    pub fn set_receiver_token(&mut self, token: String) {
        assert!(self.receiver_token.is_none(), "receiver token set twice");
        self.receiver_token = Some(token);
    }

    pub fn set_state_observer(&mut self, observer: StateObserver) {
        self.observer = Some(observer);
    }

    pub fn clear_state_observer(&mut self) {
        self.observer = None;
    }

    /// Arms a deadline for channel bring-up, measured from the first channel
    /// creation. `None` (the default) lets bring-up wait indefinitely.
    pub fn set_channel_bringup_timeout(&mut self, timeout: Option<Duration>) {
        self.bringup_timeout = timeout;
    }

    /// Feeds one inbound event into the state machine. Events arriving after
    /// the session has closed are ignored.
    ///
    /// Any returned error has already driven the session to `Failed`.
    pub fn handle_event(&mut self, event: SessionEvent, now: Instant) -> Result<()> {
        if self.closing || self.closed {
            log::trace!("event {event:?} ignored, session already closed");
            return Ok(());
        }

        let result = match event {
            SessionEvent::Signaling(signaling_event) => {
                self.on_signaling_event(signaling_event, now)
            }
            SessionEvent::ChannelConnected { channel, socket } => {
                self.on_channel_connected(channel, socket)
            }
            SessionEvent::ChannelFailed { channel } => {
                let connector = self.connectors.remove(channel);
                assert!(
                    connector.is_some(),
                    "failure reported for unregistered channel {channel}"
                );
                Err(Error::ErrChannelConnectFailed(channel.name().to_owned()))
            }
        };

        if let Err(err) = &result {
            log::error!("session fatal error: {err}");
            self.close_internal(Some(err.clone()));
        }
        result
    }

    /// Whether [`Session::dispatch_deferred`] has work pending.
    pub fn needs_dispatch(&self) -> bool {
        self.deferred.is_some()
    }

    /// Runs the transition deferred by the initiate handler. Must be called
    /// from a fresh scheduler turn, never from inside a signaling callback.
    ///
    /// `AcceptIncoming` is returned to the caller: resolving it needs the
    /// host's accept gate, which the session does not hold.
    pub fn dispatch_deferred(&mut self, _now: Instant) -> Option<DeferredAction> {
        let action = self.deferred.take()?;
        if self.closing || self.closed {
            log::trace!("deferred {action:?} dropped, session already closed");
            return None;
        }
        match action {
            DeferredAction::EnterConnecting => {
                self.set_state(SessionState::Connecting);
                None
            }
            DeferredAction::AcceptIncoming => Some(DeferredAction::AcceptIncoming),
        }
    }

    /// Moves an accepted inbound session to `Connecting`. Called by the
    /// registry once the host gate has approved the session.
    pub fn accept_incoming(&mut self, _now: Instant) {
        self.set_state(SessionState::Connecting);
    }

    /// Deadline after which pending channel bring-up fails the session.
    pub fn poll_timeout(&self) -> Option<Instant> {
        if self.closing || self.closed {
            None
        } else {
            self.bringup_deadline
        }
    }

    pub fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if self.closing || self.closed {
            return Ok(());
        }
        if let Some(deadline) = self.bringup_deadline {
            if now >= deadline && !self.connectors.is_empty() {
                log::error!(
                    "channel bring-up deadline expired with {} connector(s) pending",
                    self.connectors.len()
                );
                self.close_internal(Some(Error::ErrChannelConnectTimeout));
                return Err(Error::ErrChannelConnectTimeout);
            }
        }
        Ok(())
    }

    /// Starts bring-up of one stream channel.
    ///
    /// # Panics
    ///
    /// Panics if a connector for `channel` is already in flight, or if
    /// `channel` is a datagram channel.
    pub fn create_stream_channel(&mut self, channel: ChannelKind, now: Instant) -> Result<()> {
        assert!(!channel.is_datagram(), "{channel} is not a stream channel");
        self.create_channel(channel, now)
    }

    /// Starts bring-up of one datagram channel.
    ///
    /// # Panics
    ///
    /// Panics if a connector for `channel` is already in flight, or if
    /// `channel` is a stream channel.
    pub fn create_datagram_channel(&mut self, channel: ChannelKind, now: Instant) -> Result<()> {
        assert!(channel.is_datagram(), "{channel} is not a datagram channel");
        self.create_channel(channel, now)
    }

    pub fn socket(&self, channel: ChannelKind) -> Option<&ChannelSocket> {
        self.sockets.slot(channel).as_ref()
    }

    /// Transfers ownership of a connected channel socket to the caller.
    pub fn take_socket(&mut self, channel: ChannelKind) -> Option<ChannelSocket> {
        self.sockets.slot_mut(channel).take()
    }

    /// Gracefully closes the session. Idempotent.
    pub fn close(&mut self) {
        self.close_internal(None);
    }

    /// Returns the signaling session to its owner. Only valid once the
    /// session has fully closed.
    pub fn release_signaling(&mut self) -> Result<Box<dyn SignalingSession>> {
        if !self.closed {
            return Err(Error::ErrSessionNotClosed);
        }
        self.signaling.take().ok_or(Error::ErrNoSignalingSession)
    }

    fn on_signaling_event(&mut self, event: SignalingEvent, now: Instant) -> Result<()> {
        match event {
            SignalingEvent::InitiateSent | SignalingEvent::InitiateReceived => self.on_initiate(),
            SignalingEvent::AcceptSent | SignalingEvent::AcceptReceived => self.on_accept(now),
            SignalingEvent::TerminateSent
            | SignalingEvent::TerminateReceived
            | SignalingEvent::RejectSent
            | SignalingEvent::RejectReceived => {
                self.close_internal(None);
                Ok(())
            }
            SignalingEvent::Error(err) => {
                log::error!("signaling reported: {err}");
                Err(Error::ErrConnectionFailed)
            }
        }
    }

    fn on_initiate(&mut self) -> Result<()> {
        assert_eq!(
            self.state,
            SessionState::Initializing,
            "initiate handled in state {}",
            self.state
        );

        let remote_identity = self
            .signaling
            .as_ref()
            .ok_or(Error::ErrNoSignalingSession)?
            .remote_identity();
        self.remote_identity = Some(remote_identity);

        match self.role.local_identity().cloned() {
            // Initiator: the initiate went out, channels come after accept.
            None => {
                self.deferred = Some(DeferredAction::EnterConnecting);
            }
            // Responder: recover the master key, then defer the accept gate.
            Some(identity) => {
                let description = self
                    .signaling
                    .as_ref()
                    .and_then(|s| s.remote_description())
                    .ok_or(Error::ErrNoContentDescription)?;
                let content = description
                    .first_content_by_type(CONTENT_NAMESPACE)
                    .ok_or(Error::ErrNoContentDescription)?
                    .description
                    .clone();

                self.absorb_initiate_content(&identity, content)?;
                self.deferred = Some(DeferredAction::AcceptIncoming);
            }
        }
        Ok(())
    }

    fn absorb_initiate_content(
        &mut self,
        identity: &IdentityKeyPair,
        content: ContentDescription,
    ) -> Result<()> {
        let sealed = content
            .sealed_master_key
            .ok_or(Error::ErrNoSealedMasterKey)?;
        let master_key = crypto::open_master_key(identity, &sealed)?;
        self.master_key = Some(master_key);
        self.sealed_master_key = Some(sealed);

        if self.candidate_config.is_none() {
            self.candidate_config = content.candidate_config;
        }
        if self.initiator_token.is_none() {
            self.initiator_token = content.initiator_token;
        }
        Ok(())
    }

    fn on_accept(&mut self, now: Instant) -> Result<()> {
        assert_eq!(
            self.state,
            SessionState::Connecting,
            "accept handled in state {}",
            self.state
        );

        let signaling = self.signaling.as_ref().ok_or(Error::ErrNoSignalingSession)?;
        let is_initiator = self.role.is_initiator();

        // The final configuration lives in the accept description: the
        // remote one for the initiator, our own for the responder.
        let description = if is_initiator {
            signaling.remote_description()
        } else {
            signaling.local_description()
        }
        .ok_or(Error::ErrNoContentDescription)?;
        let content = description
            .first_content_by_type(CONTENT_NAMESPACE)
            .ok_or(Error::ErrNoContentDescription)?
            .description
            .clone();

        let final_config = content.final_config.ok_or(Error::ErrNoFinalConfig)?;

        if is_initiator {
            let certificate = content.certificate.ok_or(Error::ErrNoRemoteCertificate)?;
            if certificate.is_empty() {
                return Err(Error::ErrNoRemoteCertificate);
            }
            let candidates = self
                .candidate_config
                .as_ref()
                .ok_or(Error::ErrNoFinalConfig)?;
            if !candidates.is_supported(&final_config) {
                return Err(Error::ErrIncompatibleConfig);
            }
            self.role.set_remote_certificate(certificate);
        }

        assert!(self.config.is_none(), "session config set twice");
        self.config = Some(final_config);

        self.create_channels(now)
    }

    fn create_channels(&mut self, now: Instant) -> Result<()> {
        for channel in ChannelKind::ALL {
            if channel.is_datagram() {
                self.create_datagram_channel(channel, now)?;
            } else {
                self.create_stream_channel(channel, now)?;
            }
        }
        Ok(())
    }

    fn create_channel(&mut self, channel: ChannelKind, now: Instant) -> Result<()> {
        if self.closing || self.closed {
            return Err(Error::ErrSessionClosed);
        }
        assert!(
            !self.connectors.contains(channel),
            "duplicate connector registered for channel {channel}"
        );

        let master_key = self.master_key.as_ref().ok_or(Error::ErrNoSealedMasterKey)?;
        let channel_key = crypto::derive_channel_key(master_key, channel.name())?;

        let signaling = self.signaling.as_mut().ok_or(Error::ErrNoSignalingSession)?;
        let raw_channel = signaling.create_channel(CONTENT_NAME, channel.name())?;

        let params = ConnectParams {
            channel,
            is_initiator: self.role.is_initiator(),
            local_certificate: self.role.local_certificate().cloned(),
            remote_certificate: self.role.remote_certificate().cloned(),
            local_identity: self.role.local_identity().cloned(),
            channel_key,
            raw_channel,
        };

        let mut connector = if channel.is_datagram() {
            self.connector_factory.datagram_connector(channel)
        } else {
            self.connector_factory.stream_connector(channel)
        };
        connector.connect(params)?;
        self.connectors.insert(channel, connector);

        // Late-registered channels are not connected automatically by the
        // signaling layer; force the kick on every registration.
        if let Some(signaling) = self.signaling.as_mut() {
            signaling.connect_channels(CONTENT_NAME);
        }

        if self.bringup_deadline.is_none() {
            if let Some(timeout) = self.bringup_timeout {
                self.bringup_deadline = Some(now + timeout);
            }
        }
        Ok(())
    }

    fn on_channel_connected(&mut self, channel: ChannelKind, socket: ChannelSocket) -> Result<()> {
        // Each connector completes exactly once; the entry is destroyed here
        // whether bring-up succeeded or not.
        let connector = self.connectors.remove(channel);
        assert!(
            connector.is_some(),
            "completion reported for unregistered channel {channel}"
        );

        let slot = self.sockets.slot_mut(channel);
        assert!(slot.is_none(), "channel {channel} connected twice");
        *slot = Some(socket);
        log::trace!("channel {channel} connected");

        if self.sockets.all_connected() {
            self.bringup_deadline = None;
            self.set_state(SessionState::Connected);
        }
        Ok(())
    }

    fn set_state(&mut self, new_state: SessionState) {
        if new_state == self.state {
            return;
        }
        assert!(
            !self.state.is_terminal(),
            "session left terminal state {} for {}",
            self.state,
            new_state
        );
        log::trace!("session state {} -> {}", self.state, new_state);
        self.state = new_state;

        if !self.closed {
            if let Some(observer) = self.observer.as_mut() {
                observer(new_state);
            }
        }
    }

    // Single teardown path. `error` distinguishes `Failed` from `Closed`.
    fn close_internal(&mut self, error: Option<Error>) {
        if self.closing || self.closed {
            return;
        }
        self.closing = true;

        let new_state = if error.is_some() {
            SessionState::Failed
        } else {
            SessionState::Closed
        };
        self.error = error;
        self.set_state(new_state);

        self.sockets.clear();

        for (channel, _connector) in self.connectors.drain() {
            log::trace!("destroying in-flight connector for channel {channel}");
        }

        if let Some(signaling) = self.signaling.as_mut() {
            signaling.terminate();
        }

        self.closed = true;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The observer must never fire during destructor-driven close.
        self.observer = None;
        self.close_internal(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_capabilities() {
        let identity = IdentityKeyPair::generate();
        let certificate = Bytes::from_static(b"\x30\x82cert");

        let initiator = SessionRole::Initiator {
            peer_public_key: identity.public_key(),
            remote_certificate: None,
        };
        assert!(initiator.is_initiator());
        assert!(initiator.local_certificate().is_none());
        assert!(initiator.local_identity().is_none());
        assert!(initiator.peer_public_key().is_some());

        let responder = SessionRole::Responder {
            local_certificate: certificate.clone(),
            local_identity: identity,
        };
        assert!(!responder.is_initiator());
        assert_eq!(responder.local_certificate(), Some(&certificate));
        assert!(responder.local_identity().is_some());
        assert!(responder.peer_public_key().is_none());
    }

    #[test]
    #[should_panic(expected = "remote certificate stored on responder")]
    fn test_responder_rejects_remote_certificate() {
        let mut role = SessionRole::Responder {
            local_certificate: Bytes::from_static(b"cert"),
            local_identity: IdentityKeyPair::generate(),
        };
        role.set_remote_certificate(Bytes::from_static(b"other"));
    }
}
