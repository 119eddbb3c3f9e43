/// Errors that can occur during Double Ratchet operations.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// The session configuration is invalid. Lists every violation found.
    #[error("Invalid session configuration: {0}")]
    Config(String),

    /// Key material has the wrong length or shape.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A cryptographic operation failed.
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// The message failed authentication and was not decrypted.
    #[error("Message authentication failed")]
    Authentication,

    /// The requested message number is behind the receiving chain. Its key was
    /// either consumed already or deleted.
    #[error("Message number {until} is behind the chain position {current}")]
    StaleIndex {
        /// Message number the caller asked to skip to.
        until: u32,
        /// Current position of the receiving chain.
        current: u32,
    },

    /// Decrypting the message would require skipping more keys than allowed.
    #[error("Too many skipped messages: {requested} requested, at most {max_skip} allowed")]
    TooManySkipped {
        /// Number of keys that would have to be skipped.
        requested: u32,
        /// Configured upper bound.
        max_skip: u32,
    },

    /// A chain reached the end of its 32-bit counter space.
    #[error("Chain counter exhausted")]
    ChainExhausted,

    /// A header or message has an invalid wire format.
    #[error("Invalid message format: {0}")]
    Format(String),

    /// The skipped-key store or the session store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization/deserialization failed: {0}")]
    Serde(String),

    /// Random number generation failed.
    #[error("Random number generation failed")]
    Random,
}

impl From<aes_gcm_siv::Error> for Error {
    fn from(value: aes_gcm_siv::Error) -> Self {
        Self::Crypto(value.to_string())
    }
}
