use crate::{Crypto, DefaultCrypto, Error, InMemoryKeysStorage, KeysStorage};
use std::fmt;
use std::sync::Arc;

/// Default upper bound on keys skipped within a single chain.
pub const DEFAULT_MAX_SKIP: u32 = 1000;
/// Default number of most recent message keys kept before age-based eviction.
pub const DEFAULT_MAX_KEEP: u32 = 2000;
/// Default cap on stored message keys per session.
pub const DEFAULT_MAX_MESSAGE_KEYS_PER_SESSION: i64 = 2000;

/// Settings applied to a session when it is created or loaded.
#[derive(Clone)]
pub struct SessionConfig {
    /// Maximum number of message keys that can be skipped in one chain.
    pub max_skip: u32,
    /// Keys whose age sequence falls more than this far behind the session's
    /// key counter are deleted.
    pub max_keep: u32,
    /// Hard cap on stored message keys for the session; oldest go first.
    pub max_message_keys_per_session: i64,
    /// Crypto provider. [`DefaultCrypto`] when unset.
    pub crypto: Option<Arc<dyn Crypto>>,
    /// Skipped-key store. A private [`InMemoryKeysStorage`] when unset.
    pub keys_storage: Option<Arc<dyn KeysStorage>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_skip: DEFAULT_MAX_SKIP,
            max_keep: DEFAULT_MAX_KEEP,
            max_message_keys_per_session: DEFAULT_MAX_MESSAGE_KEYS_PER_SESSION,
            crypto: None,
            keys_storage: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("max_skip", &self.max_skip)
            .field("max_keep", &self.max_keep)
            .field(
                "max_message_keys_per_session",
                &self.max_message_keys_per_session,
            )
            .field("custom_crypto", &self.crypto.is_some())
            .field("custom_keys_storage", &self.keys_storage.is_some())
            .finish()
    }
}

impl SessionConfig {
    /// Checks every setting and reports all violations in a single error.
    pub fn validate(&self) -> Result<(), Error> {
        let mut problems = Vec::new();

        if self.max_message_keys_per_session < 0 {
            problems.push(format!(
                "max_message_keys_per_session must be non-negative, got {}",
                self.max_message_keys_per_session
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }

    /// Resolves the configured collaborators, falling back to the defaults.
    pub(crate) fn providers(&self) -> (Arc<dyn Crypto>, Arc<dyn KeysStorage>) {
        let crypto: Arc<dyn Crypto> = match &self.crypto {
            Some(crypto) => Arc::clone(crypto),
            None => Arc::new(DefaultCrypto),
        };
        let keys_storage: Arc<dyn KeysStorage> = match &self.keys_storage {
            Some(keys_storage) => Arc::clone(keys_storage),
            None => Arc::new(InMemoryKeysStorage::default()),
        };

        (crypto, keys_storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();

        assert_eq!(config.max_skip, 1000);
        assert_eq!(config.max_keep, 2000);
        assert_eq!(config.max_message_keys_per_session, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_limit_is_rejected() {
        let config = SessionConfig {
            max_message_keys_per_session: -1,
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("max_message_keys_per_session")));
    }

    #[test]
    fn test_zero_limits_are_valid() {
        let config = SessionConfig {
            max_skip: 0,
            max_keep: 0,
            max_message_keys_per_session: 0,
            ..Default::default()
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_reports_overrides() {
        let config = SessionConfig {
            crypto: Some(Arc::new(DefaultCrypto)),
            ..Default::default()
        };

        let rendered = format!("{config:?}");
        assert!(rendered.contains("custom_crypto: true"));
        assert!(rendered.contains("custom_keys_storage: false"));
    }
}
