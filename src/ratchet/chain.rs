use crate::{Crypto, Error, KEY_SIZE, SecretKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric-key ratchet: a chain key and the number of keys derived from it.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub(crate) struct Chain {
    pub(crate) chain_key: SecretKey,
    pub(crate) counter: u32,
}

impl Chain {
    pub(crate) fn new(chain_key: SecretKey) -> Self {
        Self {
            chain_key,
            counter: 0,
        }
    }

    /// Advances the chain and returns a message key
    pub(crate) fn step(&mut self, crypto: &dyn Crypto) -> Result<SecretKey, Error> {
        let counter = self.counter.checked_add(1).ok_or(Error::ChainExhausted)?;
        let (chain_key, message_key) = crypto.kdf_ck(&self.chain_key)?;

        self.chain_key = chain_key;
        self.counter = counter;

        Ok(message_key)
    }
}

/// Root-key ratchet, fed with DH outputs.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct RootChain {
    pub(crate) root_key: SecretKey,
}

impl RootChain {
    pub(crate) fn new(root_key: SecretKey) -> Self {
        Self { root_key }
    }

    /// Consumes the current root key and returns a fresh chain together with
    /// the derived header key.
    pub(crate) fn step(
        &mut self,
        crypto: &dyn Crypto,
        dh_output: &[u8; KEY_SIZE],
    ) -> Result<(Chain, SecretKey), Error> {
        let (root_key, chain_key, header_key) = crypto.kdf_rk(&self.root_key, dh_output)?;
        self.root_key = root_key;

        Ok((Chain::new(chain_key), header_key))
    }
}
