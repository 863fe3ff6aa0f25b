use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    // Key material errors
    #[error("master key must be {expected} bytes, got {actual}")]
    ErrMasterKeyLength { expected: usize, actual: usize },
    #[error("channel name must not be empty")]
    ErrEmptyChannelName,
    #[error("failed to seal master key")]
    ErrMasterKeySealFailed,
    #[error("failed to open sealed master key")]
    ErrMasterKeyOpenFailed,
    #[error("peer public key is not a valid P-256 point")]
    ErrInvalidPeerPublicKey,
    #[error("identity key is not a valid P-256 scalar")]
    ErrInvalidIdentityKey,
    #[error("initiate description carries no sealed master key")]
    ErrNoSealedMasterKey,

    // Negotiation errors
    #[error("connection response does not specify a certificate")]
    ErrNoRemoteCertificate,
    #[error("connection response does not specify a configuration")]
    ErrNoFinalConfig,
    #[error("connection response specifies an unsupported configuration")]
    ErrIncompatibleConfig,
    #[error("session description carries no content for this namespace")]
    ErrNoContentDescription,

    // Channel bring-up errors
    #[error("failed to connect channel {0}")]
    ErrChannelConnectFailed(String),
    #[error("channel bring-up deadline exceeded")]
    ErrChannelConnectTimeout,
    #[error("transport refused to create raw channel {0}")]
    ErrRawChannelUnavailable(String),

    // Session lifecycle errors
    #[error("connection failed")]
    ErrConnectionFailed,
    #[error("session is already closed")]
    ErrSessionClosed,
    #[error("session has not been closed")]
    ErrSessionNotClosed,
    #[error("session is not attached to a signaling session")]
    ErrNoSignalingSession,
    #[error("session rejected by owner")]
    ErrSessionRejected,
    #[error("no such session")]
    ErrSessionNotFound,
}
