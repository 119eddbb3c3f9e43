use crate::ratchet::decrypt_with_key;
use crate::{
    Crypto, DhKeyPair, Error, KEY_SIZE, KeysStorage, RatchetMessage, RatchetPublicKey, SecretKey,
    SessionConfig, SessionStorage, State,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use tracing::debug;

/// A Double Ratchet session with one peer.
///
/// Drives the ratchet [`State`] through encryption and decryption, keeps
/// skipped message keys in a [`KeysStorage`] and persists the state in a
/// [`SessionStorage`] after every change.
///
/// Operations take `&mut self`: a session must not be used from two places at
/// once. Share it behind a lock if several tasks need it.
pub struct Session {
    id: Vec<u8>,
    state: State,
    crypto: Arc<dyn Crypto>,
    keys_storage: Arc<dyn KeysStorage>,
    storage: Arc<dyn SessionStorage>,
}

fn shared_key_from_slice(shared_key: &[u8]) -> Result<SecretKey, Error> {
    if shared_key.is_empty() {
        return Err(Error::Config("shared key must not be empty".to_string()));
    }
    if shared_key.len() != KEY_SIZE {
        return Err(Error::InvalidKey(format!(
            "shared key must be {KEY_SIZE} bytes, got {}",
            shared_key.len()
        )));
    }

    let mut key = Box::new([0u8; KEY_SIZE]);
    key.copy_from_slice(shared_key);

    Ok(key)
}

impl Session {
    /// Creates a session for the party whose ratchet key pair the peer already knows.
    ///
    /// Both parties can send right away: until the first DH ratchet both chains
    /// are seeded from the shared key.
    pub fn new(
        id: impl Into<Vec<u8>>,
        shared_key: &[u8],
        key_pair: DhKeyPair,
        storage: Arc<dyn SessionStorage>,
        config: SessionConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let shared_key = shared_key_from_slice(shared_key)?;
        let (crypto, keys_storage) = config.providers();

        let session = Self {
            id: id.into(),
            state: State::new(shared_key, key_pair, &config),
            crypto,
            keys_storage,
            storage,
        };

        debug!(session = %session.encoded_id(), ?config, "Created session from key pair");
        session.store()?;

        Ok(session)
    }

    /// Creates a session starting from the peer's public ratchet key.
    pub fn new_with_remote_key(
        id: impl Into<Vec<u8>>,
        shared_key: &[u8],
        remote_public_key: RatchetPublicKey,
        storage: Arc<dyn SessionStorage>,
        config: SessionConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let shared_key = shared_key_from_slice(shared_key)?;
        let (crypto, keys_storage) = config.providers();

        let state =
            State::with_remote_key(shared_key, remote_public_key, crypto.as_ref(), &config)?;
        let session = Self {
            id: id.into(),
            state,
            crypto,
            keys_storage,
            storage,
        };

        debug!(session = %session.encoded_id(), ?config, "Created session from remote key");
        session.store()?;

        Ok(session)
    }

    /// Restores a previously persisted session.
    ///
    /// Returns `Ok(None)` when nothing is stored under `id`. The limits in
    /// `config` replace the persisted ones.
    pub fn load(
        id: impl Into<Vec<u8>>,
        storage: Arc<dyn SessionStorage>,
        config: SessionConfig,
    ) -> Result<Option<Self>, Error> {
        config.validate()?;
        let id = id.into();

        let Some(mut state) = storage.load(&id)? else {
            return Ok(None);
        };
        state.apply_limits(&config);

        let (crypto, keys_storage) = config.providers();
        let session = Self {
            id,
            state,
            crypto,
            keys_storage,
            storage,
        };

        debug!(session = %session.encoded_id(), "Loaded session");

        Ok(Some(session))
    }

    /// Identifier the session is stored under.
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// Our current ratchet public key.
    pub fn public_key(&self) -> RatchetPublicKey {
        self.state.public_key()
    }

    /// The committed ratchet state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Encrypts `plaintext`, binding `associated_data` and the header to the ciphertext.
    ///
    /// If persisting the new state fails, the in-memory session has already
    /// advanced and no longer matches the stored one. Treat that as fatal for
    /// the session.
    pub fn ratchet_encrypt(
        &mut self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<RatchetMessage, Error> {
        let (state, message) = self
            .state
            .encrypt(self.crypto.as_ref(), plaintext, associated_data)?;

        self.state = state;
        self.store()?;

        Ok(message)
    }

    /// Decrypts a message.
    ///
    /// Keys of messages that were skipped (or already decrypted) are served
    /// from the keys storage without touching the ratchet. Otherwise the
    /// ratchet is advanced on a copy of the state that only replaces the
    /// committed state once the message authenticated. A failed decryption
    /// leaves both the session and the keys storage unchanged.
    ///
    /// If persisting the new state fails, the in-memory session has already
    /// advanced and the plaintext is not returned. Treat that as fatal for
    /// the session.
    pub fn ratchet_decrypt(
        &mut self,
        message: &RatchetMessage,
        associated_data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let header = &message.header;

        if let Some(message_key) = self
            .keys_storage
            .get(&header.public_key, header.message_number)?
        {
            let plaintext =
                decrypt_with_key(self.crypto.as_ref(), &message_key, message, associated_data)?;
            debug!(
                session = %self.encoded_id(),
                message_number = header.message_number,
                "Decrypted with stored message key"
            );
            self.store()?;

            return Ok(plaintext);
        }

        let decrypted = self
            .state
            .decrypt(self.crypto.as_ref(), message, associated_data)?;

        for key in &decrypted.skipped_keys {
            self.keys_storage.put(
                &self.id,
                &key.public_key,
                key.message_number,
                &key.message_key,
                key.seq,
            )?;
        }
        self.evict_keys(&decrypted.state)?;

        self.state = decrypted.state;
        self.store()?;

        Ok(decrypted.plaintext)
    }

    /// Deletes a stored message key, e.g. once its message has been processed.
    pub fn delete_mk(
        &self,
        public_key: &RatchetPublicKey,
        message_number: u32,
    ) -> Result<(), Error> {
        self.keys_storage.delete_mk(public_key, message_number)
    }

    /// Applies the per-session cap and the age limit to the stored keys.
    fn evict_keys(&self, state: &State) -> Result<(), Error> {
        let max_keys = usize::try_from(state.max_message_keys_per_session).map_err(|_| {
            Error::Config("max_message_keys_per_session must be non-negative".to_string())
        })?;
        self.keys_storage.truncate_mks(&self.id, max_keys)?;

        if let Some(delete_until) = state.keys_count.checked_sub(u64::from(state.max_keep)) {
            debug!(session = %self.encoded_id(), delete_until, "Evicting old message keys");
            self.keys_storage.delete_old_mks(&self.id, delete_until)?;
        }

        Ok(())
    }

    fn store(&self) -> Result<(), Error> {
        self.storage.save(&self.id, &self.state)
    }

    fn encoded_id(&self) -> String {
        STANDARD.encode(&self.id)
    }
}
