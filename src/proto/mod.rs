use crate::ratchet::{Chain, RootChain};
use crate::{DhKeyPair, Error, KEY_SIZE, RatchetPublicKey, SecretKey, State};
use prost::Message;
use zeroize::Zeroize;

const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, PartialEq, Message)]
struct ChainProto {
    #[prost(bytes = "vec", tag = "1")]
    chain_key: Vec<u8>,
    #[prost(uint32, tag = "2")]
    counter: u32,
}

#[derive(Clone, PartialEq, Message)]
struct StateProto {
    #[prost(uint32, tag = "1")]
    version: u32,
    #[prost(bytes = "vec", tag = "2")]
    dh_private_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    dh_public_key: Vec<u8>,
    // Empty when no remote key is known yet
    #[prost(bytes = "vec", tag = "4")]
    remote_public_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    root_key: Vec<u8>,
    #[prost(message, optional, tag = "6")]
    sending_chain: Option<ChainProto>,
    #[prost(message, optional, tag = "7")]
    receiving_chain: Option<ChainProto>,
    #[prost(uint32, tag = "8")]
    previous_sending_chain_length: u32,
    #[prost(uint32, tag = "9")]
    max_skip: u32,
    #[prost(uint32, tag = "10")]
    max_keep: u32,
    #[prost(int64, tag = "11")]
    max_message_keys_per_session: i64,
    #[prost(uint64, tag = "12")]
    keys_count: u64,
}

impl Zeroize for StateProto {
    fn zeroize(&mut self) {
        self.dh_private_key.zeroize();
        self.root_key.zeroize();
        if let Some(chain) = self.sending_chain.as_mut() {
            chain.chain_key.zeroize();
        }
        if let Some(chain) = self.receiving_chain.as_mut() {
            chain.chain_key.zeroize();
        }
    }
}

fn secret_key(bytes: &[u8], name: &str) -> Result<SecretKey, Error> {
    if bytes.len() != KEY_SIZE {
        return Err(Error::Serde(format!("Invalid {name} length")));
    }

    let mut key = Box::new([0u8; KEY_SIZE]);
    key.copy_from_slice(bytes);

    Ok(key)
}

fn serialize_chain(chain: &Chain) -> ChainProto {
    ChainProto {
        chain_key: chain.chain_key.to_vec(),
        counter: chain.counter,
    }
}

fn deserialize_chain(proto: Option<&ChainProto>, name: &str) -> Result<Chain, Error> {
    let proto = proto.ok_or_else(|| Error::Serde(format!("Missing {name}")))?;

    let mut chain = Chain::new(secret_key(&proto.chain_key, name)?);
    chain.counter = proto.counter;

    Ok(chain)
}

impl State {
    /// Serialize the state to Protocol Buffers format
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let mut state_proto = StateProto {
            version: SCHEMA_VERSION,
            dh_private_key: self.dh_pair.private_key().to_vec(),
            dh_public_key: self.dh_pair.public_key().to_bytes().to_vec(),
            remote_public_key: match &self.remote_public_key {
                Some(pk) => pk.as_bytes().to_vec(),
                None => Vec::new(),
            },
            root_key: self.root_chain.root_key.to_vec(),
            sending_chain: Some(serialize_chain(&self.sending_chain)),
            receiving_chain: Some(serialize_chain(&self.receiving_chain)),
            previous_sending_chain_length: self.previous_sending_chain_length,
            max_skip: self.max_skip,
            max_keep: self.max_keep,
            max_message_keys_per_session: self.max_message_keys_per_session,
            keys_count: self.keys_count,
        };

        let mut buf = Vec::with_capacity(state_proto.encoded_len());
        let result = state_proto
            .encode(&mut buf)
            .map_err(|err| Error::Serde(format!("Failed to encode state: {err:?}")));
        state_proto.zeroize();
        result?;

        Ok(buf)
    }

    /// Deserialize a state from Protocol Buffers format
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut state_proto = StateProto::decode(bytes)
            .map_err(|err| Error::Serde(format!("Failed to decode state: {err:?}")))?;

        let state = Self::from_proto(&state_proto);
        state_proto.zeroize();

        state
    }

    fn from_proto(proto: &StateProto) -> Result<Self, Error> {
        if proto.version != SCHEMA_VERSION {
            return Err(Error::Serde(format!(
                "Unsupported schema version: {}",
                proto.version
            )));
        }

        if proto.dh_private_key.len() != KEY_SIZE || proto.dh_public_key.len() != KEY_SIZE {
            return Err(Error::Serde("Invalid DH key pair length".to_string()));
        }
        let dh_pair = DhKeyPair::from_slices(&proto.dh_private_key, &proto.dh_public_key)?;

        let remote_public_key = if proto.remote_public_key.is_empty() {
            None
        } else {
            Some(
                RatchetPublicKey::try_from(proto.remote_public_key.as_slice())
                    .map_err(|_| Error::Serde("Invalid remote public key length".to_string()))?,
            )
        };

        Ok(State {
            dh_pair,
            remote_public_key,
            root_chain: RootChain::new(secret_key(&proto.root_key, "root key")?),
            sending_chain: deserialize_chain(proto.sending_chain.as_ref(), "sending chain")?,
            receiving_chain: deserialize_chain(proto.receiving_chain.as_ref(), "receiving chain")?,
            previous_sending_chain_length: proto.previous_sending_chain_length,
            max_skip: proto.max_skip,
            max_keep: proto.max_keep,
            max_message_keys_per_session: proto.max_message_keys_per_session,
            keys_count: proto.keys_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Crypto, DefaultCrypto, SessionConfig};

    fn state() -> State {
        let crypto = DefaultCrypto;
        let remote = crypto.generate_dh().unwrap().public_key();
        let config = SessionConfig {
            max_skip: 7,
            max_keep: 8,
            max_message_keys_per_session: 9,
            ..Default::default()
        };

        State::with_remote_key(Box::new([4u8; 32]), remote, &crypto, &config).unwrap()
    }

    #[test]
    fn test_state_serialization_roundtrip() {
        let state = state();

        let bytes = state.serialize().unwrap();
        let restored = State::deserialize(&bytes).unwrap();

        assert_eq!(restored.public_key(), state.public_key());
        assert_eq!(restored.remote_public_key(), state.remote_public_key());
        assert_eq!(restored.root_chain.root_key, state.root_chain.root_key);
        assert_eq!(restored.sending_chain.chain_key, state.sending_chain.chain_key);
        assert_eq!(restored.max_skip(), 7);
        assert_eq!(restored.max_keep(), 8);
        assert_eq!(restored.max_message_keys_per_session(), 9);
        assert_eq!(restored.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_serialized_state_keeps_working() {
        let crypto = DefaultCrypto;
        let state = state();

        let (state, message) = state.encrypt(&crypto, b"first", b"").unwrap();
        let restored = State::deserialize(&state.serialize().unwrap()).unwrap();
        let (_, next) = restored.encrypt(&crypto, b"second", b"").unwrap();

        assert_eq!(message.header.message_number, 0);
        assert_eq!(next.header.message_number, 1);
        assert_eq!(next.header.public_key, message.header.public_key);
    }

    #[test]
    fn test_missing_remote_key_is_preserved() {
        let crypto = DefaultCrypto;
        let pair = crypto.generate_dh().unwrap();
        let state = State::new(Box::new([1u8; 32]), pair, &SessionConfig::default());

        let restored = State::deserialize(&state.serialize().unwrap()).unwrap();
        assert!(restored.remote_public_key().is_none());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut proto = StateProto::decode(state().serialize().unwrap().as_slice()).unwrap();
        proto.version = 2;

        let bytes = proto.encode_to_vec();
        assert!(matches!(State::deserialize(&bytes), Err(Error::Serde(_))));
    }

    #[test]
    fn test_rejects_truncated_keys() {
        let mut proto = StateProto::decode(state().serialize().unwrap().as_slice()).unwrap();
        proto.root_key.truncate(16);

        let bytes = proto.encode_to_vec();
        assert!(matches!(State::deserialize(&bytes), Err(Error::Serde(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(State::deserialize(&[0xFF, 0xFF, 0xFF]).is_err());
    }
}
