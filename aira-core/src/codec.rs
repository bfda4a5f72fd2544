//! Secret codec for stored provider keys.
//!
//! AES-128 in ECB mode with PKCS#7 padding, keyed directly by the configured
//! passphrase and base64-encoded for storage. There is no nonce and no
//! authentication tag: the same plaintext always produces the same ciphertext.
//! The format is kept byte-compatible with keys already stored by earlier
//! deployments.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{AiraError, Result};

type Aes128EcbEnc = ecb::Encryptor<aes::Aes128>;
type Aes128EcbDec = ecb::Decryptor<aes::Aes128>;

const KEY_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Normalize a passphrase to a 16-byte AES key.
///
/// Longer passphrases are truncated. Shorter ones are space-padded and then
/// every space, including any inside the passphrase, becomes `'0'`.
pub fn derive_key(passphrase: &str) -> [u8; KEY_LEN] {
    let bytes = passphrase.as_bytes();
    let mut key = [b'0'; KEY_LEN];

    if bytes.len() >= KEY_LEN {
        key.copy_from_slice(&bytes[..KEY_LEN]);
    } else {
        for (slot, &b) in key.iter_mut().zip(bytes) {
            *slot = if b == b' ' { b'0' } else { b };
        }
    }
    key
}

pub fn encrypt(plaintext: &str, passphrase: &str) -> String {
    let key = derive_key(passphrase);
    let ciphertext =
        Aes128EcbEnc::new(&key.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    STANDARD.encode(ciphertext)
}

pub fn decrypt(ciphertext: &str, passphrase: &str) -> Result<String> {
    let raw = STANDARD
        .decode(ciphertext.trim())
        .map_err(|e| AiraError::Decryption(format!("invalid base64: {}", e)))?;

    if raw.is_empty() || raw.len() % BLOCK_LEN != 0 {
        return Err(AiraError::Decryption(format!(
            "ciphertext length {} is not a multiple of {}",
            raw.len(),
            BLOCK_LEN
        )));
    }

    let key = derive_key(passphrase);
    let plain = Aes128EcbDec::new(&key.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&raw)
        .map_err(|_| AiraError::Decryption("bad padding (wrong key?)".to_string()))?;

    String::from_utf8(plain)
        .map_err(|_| AiraError::Decryption("plaintext is not valid UTF-8".to_string()))
}

/// Passphrase-bound codec shared by all request handlers.
#[derive(Clone)]
pub struct SecretCodec {
    passphrase: String,
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}

impl SecretCodec {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        encrypt(plaintext, &self.passphrase)
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        decrypt(ciphertext, &self.passphrase)
    }
}
