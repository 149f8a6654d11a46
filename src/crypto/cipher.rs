// Opsvault: Cipher Engine
//
// Seals secret strings with AES-256-GCM and a fresh random 16-byte IV.
// The sealed form is self-describing lowercase hex:
//
//     <iv>:<auth tag>:<ciphertext>
//
// so the IV and tag never need a column of their own.

use std::fmt;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use rand::RngCore;

use super::{CipherError, CipherKey};

// ─── Constants ───────────────────────────────────────────────────────────────

/// IV length in bytes. GCM accepts non-96-bit nonces; the stored format uses 16.
pub const IV_LEN: usize = 16;

/// GCM authentication tag length in bytes.
pub const AUTH_TAG_LEN: usize = 16;

const SEPARATOR: char = ':';

/// AES-256-GCM instantiated with a 128-bit nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

// ─── Blob ────────────────────────────────────────────────────────────────────

/// A sealed secret in its `iv:authTag:ciphertext` text form.
///
/// This is the only durable representation of a credential secret.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherBlob(String);

impl CipherBlob {
    /// Wrap a blob read back from storage. No validation happens here;
    /// malformed input is reported by [`decrypt`].
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CipherBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherBlob({} chars)", self.0.len())
    }
}

// ─── Seal / Open ─────────────────────────────────────────────────────────────

/// Encrypt `plaintext` under `key`.
///
/// Every call draws a new IV, so sealing the same plaintext twice yields two
/// different blobs that both open to the same value.
pub fn encrypt(plaintext: &str, key: &CipherKey) -> Result<CipherBlob, CipherError> {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let cipher = Aes256Gcm16::new(GenericArray::from_slice(key.as_bytes()));
    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<U16>::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| CipherError::TooLarge)?;

    Ok(CipherBlob(format!(
        "{}{SEPARATOR}{}{SEPARATOR}{}",
        hex::encode(iv),
        hex::encode(tag),
        hex::encode(&buffer)
    )))
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Structural problems (segment count, anything but lowercase hex, wrong IV
/// or tag length) are `Format`; everything that gets as far as the cipher and
/// fails is `Authentication`.
pub fn decrypt(blob: &str, key: &CipherKey) -> Result<String, CipherError> {
    let segments: Vec<&str> = blob.split(SEPARATOR).collect();
    let [iv_hex, tag_hex, body_hex] = segments.as_slice() else {
        return Err(CipherError::Format(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let iv = decode_segment("iv", iv_hex, Some(IV_LEN))?;
    let tag = decode_segment("auth tag", tag_hex, Some(AUTH_TAG_LEN))?;
    let mut buffer = decode_segment("ciphertext", body_hex, None)?;

    let cipher = Aes256Gcm16::new(GenericArray::from_slice(key.as_bytes()));
    cipher
        .decrypt_in_place_detached(
            Nonce::<U16>::from_slice(&iv),
            b"",
            &mut buffer,
            Tag::<U16>::from_slice(&tag),
        )
        .map_err(|_| CipherError::Authentication)?;

    // A verified tag over non-UTF-8 bytes means the blob was sealed by
    // something other than `encrypt`; report it the same opaque way.
    String::from_utf8(buffer).map_err(|_| CipherError::Authentication)
}

fn decode_segment(
    label: &str,
    segment: &str,
    expected_len: Option<usize>,
) -> Result<Vec<u8>, CipherError> {
    // Only the canonical encoding is accepted, so each stored blob has
    // exactly one text form. `hex::decode` alone would also take uppercase.
    if !segment.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(CipherError::Format(format!(
            "{} segment is not lowercase hex",
            label
        )));
    }
    let bytes = hex::decode(segment)
        .map_err(|_| CipherError::Format(format!("{} segment is not valid hex", label)))?;

    if let Some(expected) = expected_len {
        if bytes.len() != expected {
            return Err(CipherError::Format(format!(
                "{} segment must be {} bytes, found {}",
                label,
                expected,
                bytes.len()
            )));
        }
    }

    Ok(bytes)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(fill: u8) -> CipherKey {
        CipherKey::from_bytes([fill; 32])
    }

    fn split(blob: &CipherBlob) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let parts: Vec<&str> = blob.as_str().split(':').collect();
        (
            hex::decode(parts[0]).unwrap(),
            hex::decode(parts[1]).unwrap(),
            hex::decode(parts[2]).unwrap(),
        )
    }

    fn join(iv: &[u8], tag: &[u8], body: &[u8]) -> String {
        format!("{}:{}:{}", hex::encode(iv), hex::encode(tag), hex::encode(body))
    }

    #[test]
    fn test_roundtrip_ascii() {
        let key = test_key(7);
        let blob = encrypt("S3cr3t!", &key).unwrap();
        assert_eq!(decrypt(blob.as_str(), &key).unwrap(), "S3cr3t!");
    }

    #[test]
    fn test_roundtrip_empty_string() {
        let key = test_key(7);
        let blob = encrypt("", &key).unwrap();
        assert!(blob.as_str().ends_with(':'), "Empty plaintext has an empty body");
        assert_eq!(decrypt(blob.as_str(), &key).unwrap(), "");
    }

    #[test]
    fn test_roundtrip_unicode() {
        let key = test_key(7);
        let secret = "пароль-密码-🔐-contraseña";
        let blob = encrypt(secret, &key).unwrap();
        assert_eq!(decrypt(blob.as_str(), &key).unwrap(), secret);
    }

    #[test]
    fn test_roundtrip_large_secret() {
        let key = test_key(7);
        let secret = "x".repeat(64 * 1024);
        let blob = encrypt(&secret, &key).unwrap();
        assert_eq!(decrypt(blob.as_str(), &key).unwrap(), secret);
    }

    #[test]
    fn test_blob_layout() {
        let key = test_key(1);
        let blob = encrypt("abc", &key).unwrap();
        let parts: Vec<&str> = blob.as_str().split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), IV_LEN * 2);
        assert_eq!(parts[1].len(), AUTH_TAG_LEN * 2);
        assert_eq!(parts[2].len(), 3 * 2, "GCM ciphertext has plaintext length");
        assert!(blob
            .as_str()
            .chars()
            .all(|c| c == ':' || c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_same_plaintext_yields_different_blobs() {
        let key = test_key(3);
        let first = encrypt("same-secret", &key).unwrap();
        let second = encrypt("same-secret", &key).unwrap();

        assert_ne!(first, second, "Fresh IV per encryption");
        assert_eq!(decrypt(first.as_str(), &key).unwrap(), "same-secret");
        assert_eq!(decrypt(second.as_str(), &key).unwrap(), "same-secret");
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let blob = encrypt("secret", &test_key(1)).unwrap();
        let err = decrypt(blob.as_str(), &test_key(2)).unwrap_err();
        assert_eq!(err, CipherError::Authentication);
    }

    #[test]
    fn test_every_single_bit_flip_is_detected() {
        let key = test_key(9);
        let blob = encrypt("db-password", &key).unwrap();
        let (iv, tag, body) = split(&blob);

        for segment in 0..3 {
            let original = match segment {
                0 => &iv,
                1 => &tag,
                _ => &body,
            };
            for byte in 0..original.len() {
                for bit in 0..8 {
                    let mut flipped = original.clone();
                    flipped[byte] ^= 1 << bit;
                    let tampered = match segment {
                        0 => join(&flipped, &tag, &body),
                        1 => join(&iv, &flipped, &body),
                        _ => join(&iv, &tag, &flipped),
                    };
                    assert_eq!(
                        decrypt(&tampered, &key).unwrap_err(),
                        CipherError::Authentication,
                        "segment {} byte {} bit {} must not decrypt",
                        segment,
                        byte,
                        bit
                    );
                }
            }
        }
    }

    #[test]
    fn test_every_single_bit_flip_of_stored_text_is_rejected() {
        let key = test_key(9);
        let blob = encrypt("db-password", &key).unwrap();
        let original = blob.as_str().as_bytes();

        for pos in 0..original.len() {
            for bit in 0..8 {
                let mut flipped = original.to_vec();
                flipped[pos] ^= 1 << bit;
                // Non-UTF-8 bytes cannot be stored in the TEXT column at all
                let Ok(tampered) = String::from_utf8(flipped) else {
                    continue;
                };
                assert!(
                    decrypt(&tampered, &key).is_err(),
                    "char {} bit {} ({:?}) must not decrypt",
                    pos,
                    bit,
                    tampered
                );
            }
        }
    }

    #[test]
    fn test_uppercase_hex_is_format_error() {
        let key = test_key(1);
        let blob = encrypt("abc", &key).unwrap();
        let upper = blob.as_str().to_ascii_uppercase();
        assert_ne!(upper, blob.as_str(), "blob contains hex letters");
        assert!(matches!(decrypt(&upper, &key), Err(CipherError::Format(_))));
    }

    #[test]
    fn test_segment_count_is_validated() {
        let key = test_key(1);
        for blob in ["", "abcd", "aa:bb", "aa:bb:cc:dd", "::::"] {
            match decrypt(blob, &key) {
                Err(CipherError::Format(_)) => {}
                other => panic!("{:?} should be a format error, got {:?}", blob, other),
            }
        }
    }

    #[test]
    fn test_bad_hex_is_format_error() {
        let key = test_key(1);
        let blob = encrypt("abc", &key).unwrap();
        let corrupted = blob.as_str().replacen(|c: char| c.is_ascii_hexdigit(), "z", 1);
        assert!(matches!(
            decrypt(&corrupted, &key),
            Err(CipherError::Format(_))
        ));
    }

    #[test]
    fn test_wrong_iv_length_is_format_error() {
        let key = test_key(1);
        let blob = join(&[0u8; 12], &[0u8; AUTH_TAG_LEN], b"abc");
        assert!(matches!(decrypt(&blob, &key), Err(CipherError::Format(_))));
    }

    #[test]
    fn test_blob_debug_does_not_print_contents() {
        let blob = encrypt("secret", &test_key(1)).unwrap();
        let debug = format!("{:?}", blob);
        assert!(!debug.contains(blob.as_str()));
        assert!(debug.starts_with("CipherBlob("));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn encrypt_decrypt_always_roundtrips(secret in any::<String>()) {
                let key = test_key(42);
                let blob = encrypt(&secret, &key).unwrap();
                prop_assert_eq!(decrypt(blob.as_str(), &key).unwrap(), secret);
            }
        }
    }
}
