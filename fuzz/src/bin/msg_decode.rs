#[macro_use]
extern crate afl;
use doubleratchet::{MessageHeader, RatchetMessage};

fn main() {
    fuzz!(|data: &[u8]| {
        let _ = MessageHeader::decode(data);
        let _ = RatchetMessage::from_bytes(data);
    });
}
