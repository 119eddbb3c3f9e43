use crate::{Error, KEY_SIZE, KeysStorage, RatchetPublicKey, SecretKey, SessionStorage, State};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Zeroize, ZeroizeOnDrop)]
struct StoredKey {
    session_id: Vec<u8>,
    message_key: SecretKey,
    seq: u64,
}

type KeyMap = HashMap<RatchetPublicKey, HashMap<u32, StoredKey>>;

/// Skipped-key store kept in process memory.
#[derive(Default)]
pub struct InMemoryKeysStorage {
    keys: Mutex<KeyMap>,
}

impl InMemoryKeysStorage {
    fn lock(&self) -> Result<MutexGuard<'_, KeyMap>, Error> {
        self.keys
            .lock()
            .map_err(|_| Error::Storage("keys storage lock poisoned".to_string()))
    }

    /// Removes the session's keys matching `predicate` and drops emptied buckets.
    fn retain_session(keys: &mut KeyMap, session_id: &[u8], predicate: impl Fn(u64) -> bool) {
        for bucket in keys.values_mut() {
            bucket.retain(|_, key| key.session_id != session_id || !predicate(key.seq));
        }
        keys.retain(|_, bucket| !bucket.is_empty());
    }
}

impl KeysStorage for InMemoryKeysStorage {
    fn get(
        &self,
        public_key: &RatchetPublicKey,
        message_number: u32,
    ) -> Result<Option<SecretKey>, Error> {
        let keys = self.lock()?;

        Ok(keys
            .get(public_key)
            .and_then(|bucket| bucket.get(&message_number))
            .map(|key| key.message_key.clone()))
    }

    fn put(
        &self,
        session_id: &[u8],
        public_key: &RatchetPublicKey,
        message_number: u32,
        message_key: &[u8; KEY_SIZE],
        seq: u64,
    ) -> Result<(), Error> {
        let mut keys = self.lock()?;

        keys.entry(*public_key).or_default().insert(
            message_number,
            StoredKey {
                session_id: session_id.to_vec(),
                message_key: Box::new(*message_key),
                seq,
            },
        );

        Ok(())
    }

    fn delete_mk(&self, public_key: &RatchetPublicKey, message_number: u32) -> Result<(), Error> {
        let mut keys = self.lock()?;

        if let Some(bucket) = keys.get_mut(public_key) {
            bucket.remove(&message_number);
            if bucket.is_empty() {
                keys.remove(public_key);
            }
        }

        Ok(())
    }

    fn delete_old_mks(&self, session_id: &[u8], delete_until_seq: u64) -> Result<(), Error> {
        let mut keys = self.lock()?;
        Self::retain_session(&mut keys, session_id, |seq| seq < delete_until_seq);

        Ok(())
    }

    fn truncate_mks(&self, session_id: &[u8], max_keys: usize) -> Result<(), Error> {
        let mut keys = self.lock()?;

        let mut seqs: Vec<u64> = keys
            .values()
            .flat_map(|bucket| bucket.values())
            .filter(|key| key.session_id == session_id)
            .map(|key| key.seq)
            .collect();

        if seqs.len() <= max_keys {
            return Ok(());
        }

        seqs.sort_unstable();
        let youngest_kept = seqs[seqs.len() - max_keys..].first().copied();

        match youngest_kept {
            Some(threshold) => Self::retain_session(&mut keys, session_id, |seq| seq < threshold),
            None => Self::retain_session(&mut keys, session_id, |_| true),
        }

        Ok(())
    }

    fn count(&self, public_key: &RatchetPublicKey) -> Result<usize, Error> {
        let keys = self.lock()?;

        Ok(keys.get(public_key).map_or(0, HashMap::len))
    }

    fn all(&self) -> Result<HashMap<RatchetPublicKey, HashMap<u32, SecretKey>>, Error> {
        let keys = self.lock()?;

        Ok(keys
            .iter()
            .map(|(public_key, bucket)| {
                let bucket = bucket
                    .iter()
                    .map(|(message_number, key)| (*message_number, key.message_key.clone()))
                    .collect();
                (*public_key, bucket)
            })
            .collect())
    }
}

/// Session store kept in process memory.
///
/// States are held in their serialized form, so every save and load goes
/// through the same encoding a durable store would use.
#[derive(Default)]
pub struct InMemorySessionStorage {
    sessions: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemorySessionStorage {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Vec<u8>, Vec<u8>>>, Error> {
        self.sessions
            .lock()
            .map_err(|_| Error::Storage("session storage lock poisoned".to_string()))
    }
}

impl SessionStorage for InMemorySessionStorage {
    fn save(&self, session_id: &[u8], state: &State) -> Result<(), Error> {
        let bytes = state.serialize()?;
        let mut sessions = self.lock()?;

        if let Some(mut previous) = sessions.insert(session_id.to_vec(), bytes) {
            previous.zeroize();
        }

        Ok(())
    }

    fn load(&self, session_id: &[u8]) -> Result<Option<State>, Error> {
        let sessions = self.lock()?;

        sessions
            .get(session_id)
            .map(|bytes| State::deserialize(bytes))
            .transpose()
    }
}
