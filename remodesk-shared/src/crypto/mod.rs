use std::fmt;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// Length in bytes of the session master key.
pub const MASTER_KEY_LEN: usize = 16;

/// Length in bytes of a derived per-channel key.
pub const CHANNEL_KEY_LEN: usize = 16;

const SEALED_NONCE_LEN: usize = 12;
const SEALING_INFO: &[u8] = b"remodesk master key sealing v1";

/// Session-scoped secret from which all per-channel keys are derived.
///
/// Generated once by the session initiator and transported to the responder
/// inside a [`SealedMasterKey`]. The raw bytes are wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_LEN]);

impl MasterKey {
    /// Generates a fresh random master key.
    pub fn generate() -> Self {
        let mut key = [0u8; MASTER_KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        MasterKey(key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MASTER_KEY_LEN {
            return Err(Error::ErrMasterKeyLength {
                expected: MASTER_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; MASTER_KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(MasterKey(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey({})", fingerprint(&self.0))
    }
}

/// Channel-scoped key derived from the master key and the channel name.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ChannelKey([u8; CHANNEL_KEY_LEN]);

impl ChannelKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelKey({})", fingerprint(&self.0))
    }
}

/// Derives the key for a named channel: HMAC-SHA256 keyed by the master key
/// over the channel name, truncated to [`CHANNEL_KEY_LEN`] bytes.
///
/// Both peers call this with the same master key and channel name and obtain
/// the same channel key without any further exchange.
pub fn derive_channel_key(master_key: &MasterKey, channel_name: &str) -> Result<ChannelKey> {
    if channel_name.is_empty() {
        return Err(Error::ErrEmptyChannelName);
    }

    let hmac_key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, master_key.as_bytes());
    let tag = ring::hmac::sign(&hmac_key, channel_name.as_bytes());

    let mut key = [0u8; CHANNEL_KEY_LEN];
    key.copy_from_slice(&tag.as_ref()[..CHANNEL_KEY_LEN]);
    Ok(ChannelKey(key))
}

/// Long-lived P-256 key pair identifying one endpoint.
///
/// The responder publishes the public half ahead of time; the initiator seals
/// the master key to it with [`seal_master_key`].
#[derive(Clone)]
pub struct IdentityKeyPair {
    secret: p256::SecretKey,
}

impl IdentityKeyPair {
    pub fn generate() -> Self {
        IdentityKeyPair {
            secret: p256::SecretKey::random(&mut OsRng),
        }
    }

    /// Restores a key pair from the raw scalar bytes produced by
    /// [`IdentityKeyPair::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = p256::SecretKey::from_slice(bytes).map_err(|_| Error::ErrInvalidIdentityKey)?;
        Ok(IdentityKeyPair { secret })
    }

    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.secret.to_bytes().to_vec())
    }

    pub fn public_key(&self) -> PeerPublicKey {
        PeerPublicKey {
            point: self.secret.public_key(),
        }
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// Public half of an endpoint identity, exchanged as a SEC1 encoded point.
#[derive(Clone, PartialEq, Eq)]
pub struct PeerPublicKey {
    point: p256::PublicKey,
}

impl PeerPublicKey {
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        let point =
            p256::PublicKey::from_sec1_bytes(bytes).map_err(|_| Error::ErrInvalidPeerPublicKey)?;
        Ok(PeerPublicKey { point })
    }

    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.point.to_encoded_point(false).as_bytes().to_vec()
    }
}

impl fmt::Debug for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerPublicKey({})", fingerprint(&self.to_sec1_bytes()))
    }
}

/// Master key sealed to a peer's public identity key.
///
/// Produced by [`seal_master_key`] on the initiator and carried inside the
/// session-initiate description. Only the holder of the matching identity
/// secret can recover the master key with [`open_master_key`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedMasterKey {
    /// SEC1 encoding of the ephemeral ECDH public key.
    pub ephemeral_public: Vec<u8>,
    /// AES-GCM nonce, 12 bytes.
    pub nonce: Vec<u8>,
    /// AES-256-GCM ciphertext of the master key, tag appended.
    pub ciphertext: Vec<u8>,
}

/// Seals the master key to `peer` with an ephemeral P-256 ECDH exchange,
/// HKDF-SHA256 key expansion and AES-256-GCM.
pub fn seal_master_key(peer: &PeerPublicKey, master_key: &MasterKey) -> Result<SealedMasterKey> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = ephemeral.public_key().to_encoded_point(false).as_bytes().to_vec();

    let shared = ephemeral.diffie_hellman(&peer.point);
    let sealing_key = expand_sealing_key(shared.raw_secret_bytes().as_slice(), &ephemeral_public)?;

    let mut nonce = [0u8; SEALED_NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let cipher =
        Aes256Gcm::new_from_slice(&sealing_key[..]).map_err(|_| Error::ErrMasterKeySealFailed)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), master_key.as_bytes())
        .map_err(|_| Error::ErrMasterKeySealFailed)?;

    Ok(SealedMasterKey {
        ephemeral_public,
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Recovers the master key sealed to `identity`. Fails if the blob was sealed
/// to a different identity or has been tampered with.
pub fn open_master_key(identity: &IdentityKeyPair, sealed: &SealedMasterKey) -> Result<MasterKey> {
    if sealed.nonce.len() != SEALED_NONCE_LEN {
        return Err(Error::ErrMasterKeyOpenFailed);
    }

    let ephemeral = p256::PublicKey::from_sec1_bytes(&sealed.ephemeral_public)
        .map_err(|_| Error::ErrMasterKeyOpenFailed)?;
    let secret_scalar = identity.secret.to_nonzero_scalar();
    let shared = p256::ecdh::diffie_hellman(&secret_scalar, ephemeral.as_affine());

    let sealing_key =
        expand_sealing_key(shared.raw_secret_bytes().as_slice(), &sealed.ephemeral_public)?;

    let cipher =
        Aes256Gcm::new_from_slice(&sealing_key[..]).map_err(|_| Error::ErrMasterKeyOpenFailed)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|_| Error::ErrMasterKeyOpenFailed)?;

    MasterKey::from_bytes(&plaintext).map_err(|_| Error::ErrMasterKeyOpenFailed)
}

// The ephemeral public key is mixed in as HKDF salt so a sealing key is bound
// to the exchange that produced it.
fn expand_sealing_key(shared_secret: &[u8], ephemeral_public: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(ephemeral_public), shared_secret);
    let mut okm = Zeroizing::new([0u8; 32]);
    hkdf.expand(SEALING_INFO, &mut okm[..])
        .map_err(|_| Error::ErrMasterKeySealFailed)?;
    Ok(okm)
}

fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..4])
}
