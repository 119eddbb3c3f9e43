use crate::Error;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size in bytes of every ratchet key.
pub const KEY_SIZE: usize = 32;

/// Public half of a ratchet key pair, as carried in message headers.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RatchetPublicKey([u8; KEY_SIZE]);

impl RatchetPublicKey {
    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Copy out the raw key bytes.
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.0
    }
}

impl From<[u8; KEY_SIZE]> for RatchetPublicKey {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<PublicKey> for RatchetPublicKey {
    fn from(value: PublicKey) -> Self {
        Self(value.to_bytes())
    }
}

impl TryFrom<&[u8]> for RatchetPublicKey {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "ratchet public key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;

        Ok(Self(bytes))
    }
}

impl fmt::Debug for RatchetPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RatchetPublicKey({})", STANDARD.encode(self.0))
    }
}

/// A Diffie-Hellman ratchet key pair.
///
/// The private half is zeroized when the pair is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DhKeyPair {
    private_key: Box<[u8; KEY_SIZE]>,
    #[zeroize(skip)]
    public_key: RatchetPublicKey,
}

impl DhKeyPair {
    /// Assembles a key pair from its two halves.
    ///
    /// No check is made that the halves belong together; that is the
    /// responsibility of the crypto provider that produced them.
    pub fn new(private_key: Box<[u8; KEY_SIZE]>, public_key: RatchetPublicKey) -> Self {
        Self {
            private_key,
            public_key,
        }
    }

    /// Builds an X25519 key pair, deriving the public half from the private one.
    pub fn from_x25519_private(mut private_key: Box<[u8; KEY_SIZE]>) -> Self {
        let secret = StaticSecret::from(*private_key);
        let public_key = RatchetPublicKey::from(PublicKey::from(&secret));
        let pair = Self::new(Box::new(secret.to_bytes()), public_key);
        private_key.zeroize();

        pair
    }

    /// Builds a key pair from raw slices, rejecting anything that is not 32 bytes.
    pub fn from_slices(private_key: &[u8], public_key: &[u8]) -> Result<Self, Error> {
        if private_key.len() != KEY_SIZE {
            return Err(Error::InvalidKey(format!(
                "private key must be {KEY_SIZE} bytes, got {}",
                private_key.len()
            )));
        }

        let mut private = Box::new([0u8; KEY_SIZE]);
        private.copy_from_slice(private_key);

        Ok(Self::new(private, RatchetPublicKey::try_from(public_key)?))
    }

    /// Public half of the pair.
    pub fn public_key(&self) -> RatchetPublicKey {
        self.public_key
    }

    pub(crate) fn private_key(&self) -> &[u8; KEY_SIZE] {
        &self.private_key
    }
}

impl fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_rejects_wrong_length() {
        assert!(RatchetPublicKey::try_from([7u8; 31].as_slice()).is_err());
        assert!(RatchetPublicKey::try_from([7u8; 33].as_slice()).is_err());

        let key = RatchetPublicKey::try_from([7u8; 32].as_slice()).unwrap();
        assert_eq!(key.to_bytes(), [7u8; 32]);
    }

    #[test]
    fn test_x25519_public_key_derivation() {
        let pair = DhKeyPair::from_x25519_private(Box::new([9u8; 32]));
        let expected = PublicKey::from(&StaticSecret::from([9u8; 32]));

        assert_eq!(pair.public_key().as_bytes(), expected.as_bytes());
    }

    #[test]
    fn test_key_pair_from_slices() {
        assert!(DhKeyPair::from_slices(&[1u8; 16], &[2u8; 32]).is_err());
        assert!(DhKeyPair::from_slices(&[1u8; 32], &[2u8; 8]).is_err());

        let pair = DhKeyPair::from_slices(&[1u8; 32], &[2u8; 32]).unwrap();
        assert_eq!(pair.private_key(), &[1u8; 32]);
        assert_eq!(pair.public_key().to_bytes(), [2u8; 32]);
    }

    #[test]
    fn test_debug_hides_private_key() {
        let pair = DhKeyPair::from_slices(&[0xAB; 32], &[0u8; 32]).unwrap();
        let rendered = format!("{pair:?}");

        assert!(rendered.contains("public_key"));
        assert!(!rendered.contains("private_key"));
    }
}
