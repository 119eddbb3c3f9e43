use crate::{Error, KEY_SIZE, RatchetPublicKey};

/// Size in bytes of an encoded [`MessageHeader`].
pub const HEADER_SIZE: usize = 4 + 4 + KEY_SIZE;

/// Header for a ratchet message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    /// Sender's current ratchet public key.
    pub public_key: RatchetPublicKey,
    /// Length of the sender's previous sending chain (PN).
    pub previous_chain_length: u32,
    /// Number of this message in the sending chain (N).
    pub message_number: u32,
}

impl MessageHeader {
    /// Encodes the header.
    ///
    /// Layout, little-endian: `N (4) | PN (4) | public key (32)`.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.message_number.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.previous_chain_length.to_le_bytes());
        bytes[8..].copy_from_slice(self.public_key.as_bytes());

        bytes
    }

    /// Decodes a header. Anything other than exactly 40 bytes is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != HEADER_SIZE {
            return Err(Error::Format(format!(
                "header must be {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let mut n_bytes = [0u8; 4];
        n_bytes.copy_from_slice(&bytes[0..4]);

        let mut pn_bytes = [0u8; 4];
        pn_bytes.copy_from_slice(&bytes[4..8]);

        Ok(Self {
            public_key: RatchetPublicKey::try_from(&bytes[8..])?,
            previous_chain_length: u32::from_le_bytes(pn_bytes),
            message_number: u32::from_le_bytes(n_bytes),
        })
    }
}

/// An encrypted message in the Double Ratchet protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RatchetMessage {
    /// Plaintext header, authenticated as associated data.
    pub header: MessageHeader,
    /// Encrypted message payload.
    pub ciphertext: Vec<u8>,
}

impl RatchetMessage {
    /// Serializes the message to bytes for transmission.
    ///
    /// Format: [header (40 bytes)][ciphertext]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len());
        result.extend_from_slice(&self.header.encode());
        result.extend_from_slice(&self.ciphertext);

        result
    }

    /// Deserializes a message from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::Format("Message too short".to_string()));
        }

        Ok(Self {
            header: MessageHeader::decode(&bytes[..HEADER_SIZE])?,
            ciphertext: bytes[HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> MessageHeader {
        MessageHeader {
            public_key: RatchetPublicKey::from([0xAA; 32]),
            previous_chain_length: 0x0102_0304,
            message_number: 7,
        }
    }

    #[test]
    fn test_header_layout_is_little_endian() {
        let bytes = header().encode();

        assert_eq!(&bytes[0..4], &[7, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[8..], &[0xAA; 32]);
        assert_eq!(MessageHeader::decode(&bytes).unwrap(), header());
    }

    #[test]
    fn test_header_rejects_wrong_length() {
        let bytes = header().encode();

        assert!(matches!(
            MessageHeader::decode(&bytes[..39]),
            Err(Error::Format(_))
        ));

        let mut longer = bytes.to_vec();
        longer.push(0);
        assert!(matches!(
            MessageHeader::decode(&longer),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_message_bytes() {
        let message = RatchetMessage {
            header: header(),
            ciphertext: b"sealed".to_vec(),
        };

        let bytes = message.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE + 6);
        assert_eq!(RatchetMessage::from_bytes(&bytes).unwrap(), message);

        assert!(RatchetMessage::from_bytes(&bytes[..HEADER_SIZE - 1]).is_err());

        let empty = RatchetMessage::from_bytes(&bytes[..HEADER_SIZE]).unwrap();
        assert!(empty.ciphertext.is_empty());
    }
}
