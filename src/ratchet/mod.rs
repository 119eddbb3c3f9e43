mod chain;
mod message;
mod state;

pub(crate) use crate::ratchet::chain::{Chain, RootChain};
pub use crate::ratchet::message::{HEADER_SIZE, MessageHeader, RatchetMessage};
pub use crate::ratchet::state::State;
use crate::{Crypto, DhKeyPair, Error, KEY_SIZE, RatchetPublicKey, SecretKey, SessionConfig};
use std::cell::RefCell;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

// Upper bound on the up-front reservation for skipped keys
const SKIPPED_KEYS_RESERVE: u32 = 64;

thread_local! {
    static AD_BUFFER: RefCell<Vec<u8>> = RefCell::new(Vec::with_capacity(256));
}

/// Runs `f` with a scratch buffer holding `associated_data || encoded header`.
fn with_ad_buffer<F, R>(associated_data: &[u8], header: &MessageHeader, f: F) -> R
where
    F: FnOnce(&[u8]) -> R,
{
    AD_BUFFER.with(|buffer| {
        let mut buffer = buffer.borrow_mut();
        buffer.clear();
        buffer.extend_from_slice(associated_data);
        buffer.extend_from_slice(&header.encode());
        f(&buffer)
    })
}

/// A message key generated while advancing a receiving chain.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SkippedKey {
    #[zeroize(skip)]
    pub(crate) public_key: RatchetPublicKey,
    pub(crate) message_number: u32,
    pub(crate) message_key: SecretKey,
    pub(crate) seq: u64,
}

/// Outcome of a successful slow-path decryption, not yet committed.
pub(crate) struct Decrypted {
    pub(crate) state: State,
    pub(crate) plaintext: Vec<u8>,
    pub(crate) skipped_keys: Vec<SkippedKey>,
}

/// Decrypts `ciphertext` with a known message key, authenticating the header.
pub(crate) fn decrypt_with_key(
    crypto: &dyn Crypto,
    message_key: &[u8; KEY_SIZE],
    message: &RatchetMessage,
    associated_data: &[u8],
) -> Result<Vec<u8>, Error> {
    with_ad_buffer(associated_data, &message.header, |ad| {
        crypto.decrypt(message_key, &message.ciphertext, ad)
    })
}

impl State {
    /// State for the party that owns the key pair the peer already knows.
    ///
    /// Both chains start from the shared key so either side can send from
    /// message zero, before any DH ratchet has happened.
    pub(crate) fn new(shared_key: SecretKey, dh_pair: DhKeyPair, config: &SessionConfig) -> Self {
        Self {
            dh_pair,
            remote_public_key: None,
            root_chain: RootChain::new(shared_key.clone()),
            sending_chain: Chain::new(shared_key.clone()),
            receiving_chain: Chain::new(shared_key),
            previous_sending_chain_length: 0,
            max_skip: config.max_skip,
            max_keep: config.max_keep,
            max_message_keys_per_session: config.max_message_keys_per_session,
            keys_count: 0,
        }
    }

    /// State for the party that starts from the peer's public ratchet key.
    ///
    /// A fresh key pair is generated and the root chain is stepped once to
    /// derive the sending chain. The receiving chain stays on the shared key
    /// until the peer's first new ratchet key shows up.
    pub(crate) fn with_remote_key(
        shared_key: SecretKey,
        remote_public_key: RatchetPublicKey,
        crypto: &dyn Crypto,
        config: &SessionConfig,
    ) -> Result<Self, Error> {
        let dh_pair = crypto.generate_dh()?;
        let mut state = Self::new(shared_key, dh_pair, config);

        let dh_output = crypto.dh(&state.dh_pair, &remote_public_key)?;
        let (sending_chain, _header_key) = state.root_chain.step(crypto, &dh_output)?;

        state.remote_public_key = Some(remote_public_key);
        state.sending_chain = sending_chain;

        Ok(state)
    }

    pub(crate) fn apply_limits(&mut self, config: &SessionConfig) {
        self.max_skip = config.max_skip;
        self.max_keep = config.max_keep;
        self.max_message_keys_per_session = config.max_message_keys_per_session;
    }

    /// Encrypts `plaintext`, returning the advanced state and the message.
    ///
    /// Only the sending chain moves; encryption never performs a DH ratchet.
    pub(crate) fn encrypt(
        &self,
        crypto: &dyn Crypto,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<(State, RatchetMessage), Error> {
        let mut next = self.clone();

        let header = MessageHeader {
            public_key: next.dh_pair.public_key(),
            previous_chain_length: next.previous_sending_chain_length,
            message_number: next.sending_chain.counter,
        };

        let message_key = next.sending_chain.step(crypto)?;
        let ciphertext = with_ad_buffer(associated_data, &header, |ad| {
            crypto.encrypt(&message_key, plaintext, ad)
        })?;

        Ok((next, RatchetMessage { header, ciphertext }))
    }

    /// Decrypts a message that is not served from the skipped-key store.
    ///
    /// All changes happen on a copy of the state. `self` is left untouched,
    /// so a failure at any point leaves the committed session as it was.
    pub(crate) fn decrypt(
        &self,
        crypto: &dyn Crypto,
        message: &RatchetMessage,
        associated_data: &[u8],
    ) -> Result<Decrypted, Error> {
        let header = &message.header;
        let mut scratch = self.clone();
        let mut skipped_keys = Vec::new();

        if scratch.remote_public_key != Some(header.public_key) {
            skipped_keys = scratch.skip_message_keys(crypto, header.previous_chain_length)?;
            scratch.dh_ratchet(crypto, header)?;
        }

        skipped_keys.append(&mut scratch.skip_message_keys(crypto, header.message_number)?);

        let message_key = scratch.receiving_chain.step(crypto)?;
        let plaintext = decrypt_with_key(crypto, &message_key, message, associated_data)
            .inspect_err(|err| {
                warn!(message_number = header.message_number, %err, "Decryption failed");
            })?;

        // Keep the key of this message as well, until it is deleted or evicted.
        skipped_keys.push(SkippedKey {
            public_key: header.public_key,
            message_number: header.message_number,
            message_key,
            seq: scratch.keys_count,
        });
        scratch.keys_count += 1;

        Ok(Decrypted {
            state: scratch,
            plaintext,
            skipped_keys,
        })
    }

    /// Advances the receiving chain up to `until`, collecting the skipped keys.
    ///
    /// Keys are tagged with the current remote ratchet key. Before any remote
    /// key is known no message can have been sent on the receiving chain, so
    /// nothing is generated.
    fn skip_message_keys(
        &mut self,
        crypto: &dyn Crypto,
        until: u32,
    ) -> Result<Vec<SkippedKey>, Error> {
        let current = self.receiving_chain.counter;

        if until < current {
            warn!(until, current, "Message number behind receiving chain");
            return Err(Error::StaleIndex { until, current });
        }

        let requested = until - current;
        if requested > self.max_skip {
            warn!(requested, max_skip = self.max_skip, "Too many skipped messages");
            return Err(Error::TooManySkipped {
                requested,
                max_skip: self.max_skip,
            });
        }

        let Some(public_key) = self.remote_public_key else {
            return Ok(Vec::new());
        };

        let mut skipped = Vec::with_capacity(requested.min(SKIPPED_KEYS_RESERVE) as usize);
        while self.receiving_chain.counter < until {
            let message_key = self.receiving_chain.step(crypto)?;
            skipped.push(SkippedKey {
                public_key,
                message_number: self.receiving_chain.counter - 1,
                message_key,
                seq: self.keys_count,
            });
            self.keys_count += 1;
        }

        if !skipped.is_empty() {
            debug!(count = skipped.len(), "Generated skipped message keys");
        }

        Ok(skipped)
    }

    /// Performs a Diffie-Hellman ratchet step.
    fn dh_ratchet(&mut self, crypto: &dyn Crypto, header: &MessageHeader) -> Result<(), Error> {
        self.previous_sending_chain_length = self.sending_chain.counter;
        self.remote_public_key = Some(header.public_key);

        // Derive new receiving chain
        let dh_output = crypto.dh(&self.dh_pair, &header.public_key)?;
        let (receiving_chain, _header_key) = self.root_chain.step(crypto, &dh_output)?;
        self.receiving_chain = receiving_chain;

        // Derive new sending chain from a new key pair
        let dh_pair = crypto.generate_dh()?;
        let dh_output = crypto.dh(&dh_pair, &header.public_key)?;
        let (sending_chain, _header_key) = self.root_chain.step(crypto, &dh_output)?;
        self.sending_chain = sending_chain;
        self.dh_pair = dh_pair;

        debug!(
            previous_chain_length = self.previous_sending_chain_length,
            "Performed DH ratchet step"
        );

        Ok(())
    }
}
