mod memory;
pub use memory::*;

use crate::{Error, KEY_SIZE, RatchetPublicKey, SecretKey, State};
use std::collections::HashMap;

/// Storage for skipped message keys.
///
/// A single store is usually shared by many sessions, so implementations
/// synchronize internally. Keys are addressed by the ratchet public key and
/// message number they belong to, and carry the id of the owning session and
/// an age sequence used for eviction.
pub trait KeysStorage: Send + Sync {
    /// Looks up the message key for `(public_key, message_number)`.
    fn get(
        &self,
        public_key: &RatchetPublicKey,
        message_number: u32,
    ) -> Result<Option<SecretKey>, Error>;

    /// Stores a message key.
    fn put(
        &self,
        session_id: &[u8],
        public_key: &RatchetPublicKey,
        message_number: u32,
        message_key: &[u8; KEY_SIZE],
        seq: u64,
    ) -> Result<(), Error>;

    /// Deletes a single message key. Missing keys are not an error.
    fn delete_mk(&self, public_key: &RatchetPublicKey, message_number: u32) -> Result<(), Error>;

    /// Deletes the session's keys whose age sequence is below `delete_until_seq`.
    ///
    /// The cutoff is exclusive: a key whose sequence equals `delete_until_seq`
    /// is kept.
    fn delete_old_mks(&self, session_id: &[u8], delete_until_seq: u64) -> Result<(), Error>;

    /// Keeps only the `max_keys` youngest keys of the session.
    fn truncate_mks(&self, session_id: &[u8], max_keys: usize) -> Result<(), Error>;

    /// Number of keys stored under a ratchet public key.
    fn count(&self, public_key: &RatchetPublicKey) -> Result<usize, Error>;

    /// Every stored key, grouped by ratchet public key.
    fn all(&self) -> Result<HashMap<RatchetPublicKey, HashMap<u32, SecretKey>>, Error>;
}

/// Durable storage of whole session states.
pub trait SessionStorage: Send + Sync {
    /// Persists `state` under `session_id`, replacing any previous state.
    fn save(&self, session_id: &[u8], state: &State) -> Result<(), Error>;

    /// Loads the state saved under `session_id`, if there is one.
    fn load(&self, session_id: &[u8]) -> Result<Option<State>, Error>;
}
