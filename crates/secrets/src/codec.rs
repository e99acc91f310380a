//! Triple-DES/ECB transform over a base64 envelope.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use des::TdesEde3;

use crate::error::{CodecError, CodecResult};

const KEY_LEN: usize = 24;
const BLOCK_LEN: usize = 8;

type EcbEncryptor = ecb::Encryptor<TdesEde3>;
type EcbDecryptor = ecb::Decryptor<TdesEde3>;

/// Decrypt a base64-wrapped ciphertext with the stored salt key.
///
/// Deterministic: the same ciphertext and key always yield the same bytes.
/// There is no integrity check; only structurally impossible input is
/// rejected.
pub fn decrypt(ciphertext_b64: &str, key: &str) -> CodecResult<Vec<u8>> {
    let ciphertext = BASE64.decode(ciphertext_b64.trim()).map_err(|e| {
        CodecError::MalformedCiphertext {
            reason: format!("invalid base64: {e}"),
        }
    })?;

    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CodecError::MalformedCiphertext {
            reason: format!(
                "ciphertext length {} is not a positive multiple of the {BLOCK_LEN}-byte block",
                ciphertext.len()
            ),
        });
    }

    let decryptor = new_decryptor(key)?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CodecError::MalformedCiphertext {
            reason: "invalid block padding".into(),
        })
}

/// [`decrypt`], then require the plaintext to be UTF-8 text.
///
/// Stored passwords are text; this is the variant callers actually want.
pub fn decrypt_to_string(ciphertext_b64: &str, key: &str) -> CodecResult<String> {
    Ok(String::from_utf8(decrypt(ciphertext_b64, key)?)?)
}

/// Encrypt plaintext into the base64-wrapped form the config store holds.
///
/// Inverse of [`decrypt`]; the daemon itself only reads secrets, but the
/// round-trip is the codec's contract with the provisioning side.
pub fn encrypt(plaintext: &[u8], key: &str) -> CodecResult<String> {
    let encryptor = new_encryptor(key)?;
    let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    Ok(BASE64.encode(ciphertext))
}

fn new_encryptor(key: &str) -> CodecResult<EcbEncryptor> {
    EcbEncryptor::new_from_slice(key.as_bytes()).map_err(|_| CodecError::InvalidKeyLength {
        actual: key.len(),
    })
}

fn new_decryptor(key: &str) -> CodecResult<EcbDecryptor> {
    EcbDecryptor::new_from_slice(key.as_bytes()).map_err(|_| CodecError::InvalidKeyLength {
        actual: key.len(),
    })
}
