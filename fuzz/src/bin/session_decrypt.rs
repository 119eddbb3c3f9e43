#[macro_use]
extern crate afl;
use doubleratchet::{
    Crypto, DefaultCrypto, InMemorySessionStorage, RatchetMessage, Session, SessionConfig,
};
use std::sync::Arc;

fn get_session() -> Session {
    // The victim holds the key pair the attacker targets
    let key_pair = DefaultCrypto.generate_dh().expect("Setup failed");
    let storage = Arc::new(InMemorySessionStorage::default());

    Session::new(
        "fuzz",
        &[0u8; 32],
        key_pair,
        storage,
        SessionConfig::default(),
    )
    .expect("Setup failed")
}

fn main() {
    let mut session = get_session();
    let associated_data = b"fuzz-context";

    fuzz!(|data: &[u8]| {
        if let Ok(msg) = RatchetMessage::from_bytes(data) {
            let _ = session.ratchet_decrypt(&msg, associated_data);
        }
    });
}
