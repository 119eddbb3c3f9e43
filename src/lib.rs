//! Double Ratchet sessions for pairwise asynchronous messaging.
//!
//! Cryptographic primitives are supplied through the [`Crypto`] trait,
//! skipped message keys live in a [`KeysStorage`] and session state is
//! persisted through a [`SessionStorage`]. [`DefaultCrypto`] and the
//! in-memory stores cover the common case.

mod types;
pub use types::*;

mod crypto;
pub use crypto::*;

mod ratchet;
pub use ratchet::{HEADER_SIZE, MessageHeader, RatchetMessage, State};

mod storage;
pub use storage::*;

mod proto;

mod error;
pub use error::Error;

mod config;
pub use config::*;

mod session;
pub use session::Session;
