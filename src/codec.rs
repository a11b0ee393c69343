//! Repeating-key XOR obfuscation for payloads at rest.
//!
//! This is obfuscation, not encryption: there is no authentication and no
//! integrity check. [`ObfuscationCodec::decode`] never fails, so callers must
//! validate the decoded text structurally before trusting it.

use thiserror::Error;

/// Shared key used when no key is configured.
pub const DEFAULT_KEY: &str = "trailkeep-shared-obfuscation-key";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("obfuscation key must not be empty")]
    EmptyKey,
}

/// Byte-wise XOR transform keyed by a non-empty shared secret.
///
/// The transform is its own inverse: `decode` applies the same XOR to the
/// cipher bytes and reinterprets the result as UTF-8.
#[derive(Clone)]
pub struct ObfuscationCodec {
    key: Vec<u8>,
}

impl ObfuscationCodec {
    /// Build a codec. An empty key is a configuration error.
    pub fn new(key: &str) -> Result<Self, CodecError> {
        if key.is_empty() {
            return Err(CodecError::EmptyKey);
        }
        Ok(Self {
            key: key.as_bytes().to_vec(),
        })
    }

    pub fn encode(&self, plaintext: &str) -> Vec<u8> {
        self.apply(plaintext.as_bytes())
    }

    /// Reverse [`encode`](Self::encode). Invalid UTF-8 produced by corrupt or
    /// foreign input is replaced rather than rejected.
    pub fn decode(&self, cipher: &[u8]) -> String {
        let plain = self.apply(cipher);
        match String::from_utf8(plain) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    fn apply(&self, bytes: &[u8]) -> Vec<u8> {
        bytes
            .iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}

impl std::fmt::Debug for ObfuscationCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObfuscationCodec")
            .field("key_len", &self.key.len())
            .finish()
    }
}
