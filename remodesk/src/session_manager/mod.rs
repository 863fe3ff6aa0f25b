use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use bytes::Bytes;

use shared::crypto::{IdentityKeyPair, PeerPublicKey};
use shared::error::{Error, Result};

use crate::config::CandidateSessionConfig;
use crate::connector::ConnectorFactory;
use crate::session::{DeferredAction, Session};

/// Registry-scoped session identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Hook the registry's owner implements to arbitrate inbound sessions and
/// learn about destruction.
pub trait SessionHost {
    /// Gate for inbound sessions. Returning `false` rejects the session;
    /// the registry closes and destroys it.
    fn accept_session(&mut self, id: SessionId, session: &Session) -> bool;

    fn session_destroyed(&mut self, id: SessionId);
}

/// Owns every live session and resolves the parts of the lifecycle that need
/// the host: the inbound accept gate and destruction notification.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    next_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    pub fn create_initiator_session(
        &mut self,
        candidate_config: CandidateSessionConfig,
        peer_public_key: PeerPublicKey,
        connector_factory: Box<dyn ConnectorFactory>,
    ) -> Result<SessionId> {
        let session =
            Session::new_initiator(candidate_config, peer_public_key, connector_factory)?;
        Ok(self.register(session))
    }

    pub fn create_responder_session(
        &mut self,
        local_certificate: Bytes,
        local_identity: IdentityKeyPair,
        connector_factory: Box<dyn ConnectorFactory>,
    ) -> SessionId {
        let session = Session::new_responder(local_certificate, local_identity, connector_factory);
        self.register(session)
    }

    fn register(&mut self, session: Session) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(id, session);
        log::trace!("{id} registered");
        id
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Runs a session's deferred transition. An inbound session pending
    /// acceptance is put through the host gate: accepted sessions move to
    /// `Connecting`, rejected ones are closed and destroyed.
    pub fn dispatch_deferred(
        &mut self,
        id: SessionId,
        now: Instant,
        host: &mut dyn SessionHost,
    ) -> Result<()> {
        let session = self.sessions.get_mut(&id).ok_or(Error::ErrSessionNotFound)?;

        if let Some(DeferredAction::AcceptIncoming) = session.dispatch_deferred(now) {
            if host.accept_session(id, session) {
                session.accept_incoming(now);
            } else {
                log::warn!("{id} rejected by host");
                session.close();
                self.destroy_session(id, host)?;
                return Err(Error::ErrSessionRejected);
            }
        }
        Ok(())
    }

    /// Closes and removes a session, then notifies the host. The observer is
    /// cleared first so it cannot fire during the destruction-driven close.
    pub fn destroy_session(&mut self, id: SessionId, host: &mut dyn SessionHost) -> Result<()> {
        let mut session = self.sessions.remove(&id).ok_or(Error::ErrSessionNotFound)?;
        session.clear_state_observer();
        session.close();
        drop(session);

        host.session_destroyed(id);
        log::trace!("{id} destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ChannelConnector;
    use crate::constants::ChannelKind;

    struct NullFactory;

    impl ConnectorFactory for NullFactory {
        fn stream_connector(&mut self, _channel: ChannelKind) -> Box<dyn ChannelConnector> {
            unreachable!("no channels are created in registry tests")
        }

        fn datagram_connector(&mut self, _channel: ChannelKind) -> Box<dyn ChannelConnector> {
            unreachable!("no channels are created in registry tests")
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        accept: bool,
        destroyed: Vec<SessionId>,
    }

    impl SessionHost for RecordingHost {
        fn accept_session(&mut self, _id: SessionId, _session: &Session) -> bool {
            self.accept
        }

        fn session_destroyed(&mut self, id: SessionId) {
            self.destroyed.push(id);
        }
    }

    #[test]
    fn test_registry_create_lookup_destroy() -> Result<()> {
        let mut registry = SessionRegistry::new();
        let mut host = RecordingHost::default();

        let identity = IdentityKeyPair::generate();
        let id = registry.create_initiator_session(
            CandidateSessionConfig::default_config(),
            identity.public_key(),
            Box::new(NullFactory),
        )?;
        assert_eq!(registry.len(), 1);
        assert!(registry.get(id).is_some());

        registry.destroy_session(id, &mut host)?;
        assert!(registry.is_empty());
        assert_eq!(host.destroyed, vec![id]);

        assert_eq!(
            registry.destroy_session(id, &mut host),
            Err(Error::ErrSessionNotFound)
        );
        Ok(())
    }

    #[test]
    fn test_registry_ids_unique() {
        let mut registry = SessionRegistry::new();
        let identity = IdentityKeyPair::generate();

        let a = registry.create_responder_session(
            Bytes::from_static(b"cert"),
            identity.clone(),
            Box::new(NullFactory),
        );
        let b = registry.create_responder_session(
            Bytes::from_static(b"cert"),
            identity,
            Box::new(NullFactory),
        );
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }
}
