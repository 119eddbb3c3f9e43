use crate::ratchet::chain::{Chain, RootChain};
use crate::{DhKeyPair, RatchetPublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Full snapshot of a ratchet session.
///
/// This is the unit that is persisted by a [`crate::SessionStorage`] and
/// restored with [`crate::Session::load`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct State {
    pub(crate) dh_pair: DhKeyPair,

    #[zeroize(skip)]
    pub(crate) remote_public_key: Option<RatchetPublicKey>,

    pub(crate) root_chain: RootChain,
    pub(crate) sending_chain: Chain,
    pub(crate) receiving_chain: Chain,

    // Length of the sending chain before the last DH ratchet
    pub(crate) previous_sending_chain_length: u32,

    pub(crate) max_skip: u32,
    pub(crate) max_keep: u32,
    pub(crate) max_message_keys_per_session: i64,

    // Age sequence handed to the next stored message key
    pub(crate) keys_count: u64,
}

impl State {
    /// Our current ratchet public key.
    pub fn public_key(&self) -> RatchetPublicKey {
        self.dh_pair.public_key()
    }

    /// The last ratchet public key seen from the peer, if any.
    pub fn remote_public_key(&self) -> Option<RatchetPublicKey> {
        self.remote_public_key
    }

    /// Number of messages sent on the current sending chain.
    pub fn sending_counter(&self) -> u32 {
        self.sending_chain.counter
    }

    /// Number of message keys derived on the current receiving chain.
    pub fn receiving_counter(&self) -> u32 {
        self.receiving_chain.counter
    }

    /// Length of our sending chain before the last DH ratchet (PN).
    pub fn previous_sending_chain_length(&self) -> u32 {
        self.previous_sending_chain_length
    }

    /// Maximum number of keys skipped within one receiving chain.
    pub fn max_skip(&self) -> u32 {
        self.max_skip
    }

    /// Number of most recent message keys kept before age-based eviction.
    pub fn max_keep(&self) -> u32 {
        self.max_keep
    }

    /// Cap on stored message keys for this session.
    pub fn max_message_keys_per_session(&self) -> i64 {
        self.max_message_keys_per_session
    }

    /// Total number of message keys ever stored for this session.
    pub fn keys_count(&self) -> u64 {
        self.keys_count
    }
}
