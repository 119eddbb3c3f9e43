use crate::{DhKeyPair, Error, KEY_SIZE, RatchetPublicKey};
use aes_gcm_siv::aead::{Aead, Payload};
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// A 32-byte secret: root, chain, header or message key.
pub type SecretKey = Box<[u8; KEY_SIZE]>;

const NONCE_SIZE: usize = 12; // AES-GCM-SIV uses 12-byte (96-bit) nonces

/// The cryptographic primitives a session runs on.
///
/// Implementations are stateless and shared between sessions, so they must be
/// `Send + Sync`. Every session threads its provider explicitly; there is no
/// process-wide default.
pub trait Crypto: Send + Sync {
    /// Generates a fresh ratchet key pair.
    fn generate_dh(&self) -> Result<DhKeyPair, Error>;

    /// Computes the Diffie-Hellman output between our key pair and the peer's public key.
    fn dh(&self, key_pair: &DhKeyPair, public_key: &RatchetPublicKey) -> Result<SecretKey, Error>;

    /// Authenticated encryption of `plaintext` under a one-time message key.
    fn encrypt(
        &self,
        message_key: &[u8; KEY_SIZE],
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, Error>;

    /// Authenticated decryption. Must fail with [`Error::Authentication`] on a tag mismatch.
    fn decrypt(
        &self,
        message_key: &[u8; KEY_SIZE],
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, Error>;

    /// Root KDF.
    ///
    /// # Returns
    ///
    /// A tuple containing:
    /// 1. The new root key
    /// 2. The new chain key
    /// 3. The new header key
    fn kdf_rk(
        &self,
        root_key: &[u8; KEY_SIZE],
        dh_output: &[u8; KEY_SIZE],
    ) -> Result<(SecretKey, SecretKey, SecretKey), Error>;

    /// Chain KDF. Returns the next chain key and the message key.
    fn kdf_ck(&self, chain_key: &[u8; KEY_SIZE]) -> Result<(SecretKey, SecretKey), Error>;
}

/// Default provider: X25519, HKDF-SHA256, HMAC-SHA256 and AES-256-GCM-SIV.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCrypto;

impl DefaultCrypto {
    fn expand(hkdf: &Hkdf<Sha256>, info: &[u8]) -> Result<SecretKey, Error> {
        let mut okm = Box::new([0u8; KEY_SIZE]);
        hkdf.expand(info, okm.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed".to_string()))?;

        Ok(okm)
    }

    fn chain_mac(chain_key: &[u8; KEY_SIZE], input: u8) -> Result<SecretKey, Error> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(chain_key.as_slice())
            .map_err(|_| Error::Crypto("HMAC initialization failed".to_string()))?;
        mac.update(&[input]);

        let mut output = Box::new([0u8; KEY_SIZE]);
        output.copy_from_slice(&mac.finalize().into_bytes());

        Ok(output)
    }

    /// Derives the AEAD key and nonce from a message key.
    fn cipher(message_key: &[u8; KEY_SIZE]) -> Result<(Aes256GcmSiv, [u8; NONCE_SIZE]), Error> {
        let hkdf = Hkdf::<Sha256>::new(None, message_key);

        let mut derived_material = [0u8; KEY_SIZE + NONCE_SIZE];
        hkdf.expand(b"DoubleRatchet-Message-Keys", &mut derived_material)
            .map_err(|_| Error::Crypto("HKDF expansion failed".to_string()))?;

        let key = aes_gcm_siv::Key::<Aes256GcmSiv>::from_slice(&derived_material[..KEY_SIZE]);
        let cipher = Aes256GcmSiv::new(key);

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&derived_material[KEY_SIZE..]);
        derived_material.zeroize();

        Ok((cipher, nonce))
    }
}

impl Crypto for DefaultCrypto {
    fn generate_dh(&self) -> Result<DhKeyPair, Error> {
        let mut seed = Box::new([0u8; KEY_SIZE]);
        OsRng
            .try_fill_bytes(seed.as_mut_slice())
            .map_err(|_| Error::Random)?;

        Ok(DhKeyPair::from_x25519_private(seed))
    }

    fn dh(&self, key_pair: &DhKeyPair, public_key: &RatchetPublicKey) -> Result<SecretKey, Error> {
        let secret = StaticSecret::from(*key_pair.private_key());
        let shared = secret.diffie_hellman(&PublicKey::from(public_key.to_bytes()));

        if !shared.was_contributory() {
            return Err(Error::Crypto(
                "Non-contributory Diffie-Hellman output".to_string(),
            ));
        }

        Ok(Box::new(shared.to_bytes()))
    }

    fn encrypt(
        &self,
        message_key: &[u8; KEY_SIZE],
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let (cipher, nonce) = Self::cipher(message_key)?;

        let ciphertext = cipher.encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )?;

        Ok(ciphertext)
    }

    fn decrypt(
        &self,
        message_key: &[u8; KEY_SIZE],
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let (cipher, nonce) = Self::cipher(message_key)?;

        cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map_err(|_| Error::Authentication)
    }

    fn kdf_rk(
        &self,
        root_key: &[u8; KEY_SIZE],
        dh_output: &[u8; KEY_SIZE],
    ) -> Result<(SecretKey, SecretKey, SecretKey), Error> {
        let hkdf = Hkdf::<Sha256>::new(Some(root_key.as_slice()), dh_output);

        let root_key = Self::expand(&hkdf, b"DoubleRatchet-Root")?;
        let chain_key = Self::expand(&hkdf, b"DoubleRatchet-Chain")?;
        let header_key = Self::expand(&hkdf, b"DoubleRatchet-Header")?;

        Ok((root_key, chain_key, header_key))
    }

    fn kdf_ck(&self, chain_key: &[u8; KEY_SIZE]) -> Result<(SecretKey, SecretKey), Error> {
        let next_chain_key = Self::chain_mac(chain_key, 0x01)?;
        let message_key = Self::chain_mac(chain_key, 0x02)?;

        Ok((next_chain_key, message_key))
    }
}
