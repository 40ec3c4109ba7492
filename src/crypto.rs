//! Job bodies for the encryption and hashing pools: AES-256-GCM, HMAC-SHA256,
//! SHA-256 digests and bcrypt password hashes.

use aes_gcm::{
    AeadCore, AesGcm, KeyInit, Nonce,
    aead::{Aead, OsRng, consts::U16},
    aes::Aes256,
};
use anyhow::{Context, Result, anyhow, bail};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// AES-256-GCM with the 16-byte IVs room keys are issued with.
type RoomCipher = AesGcm<Aes256, U16>;
type HmacSha256 = Hmac<Sha256>;

/// bcrypt cost used when the caller does not pick one.
pub const DEFAULT_PASSWORD_COST: u32 = 10;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    pub ciphertext_hex: String,
    pub tag_hex: String,
}

/// A file sealed under a freshly drawn IV, which travels with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedFile {
    pub ciphertext_hex: String,
    pub iv_hex: String,
    pub tag_hex: String,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

pub fn encrypt(plaintext: &[u8], key_hex: &str, iv_hex: &str) -> Result<Sealed> {
    let cipher = cipher(key_hex)?;
    let iv = decode_iv(iv_hex)?;
    let mut out = cipher
        .encrypt(Nonce::<U16>::from_slice(&iv), plaintext)
        .map_err(|_| anyhow!("encryption failed"))?;
    let tag = out.split_off(out.len() - TAG_LEN);
    Ok(Sealed {
        ciphertext_hex: hex::encode(out),
        tag_hex: hex::encode(tag),
    })
}

pub fn decrypt(ciphertext_hex: &str, key_hex: &str, iv_hex: &str, tag_hex: &str) -> Result<Vec<u8>> {
    let cipher = cipher(key_hex)?;
    let iv = decode_iv(iv_hex)?;
    let mut combined = hex::decode(ciphertext_hex).with_context(|| "decoding ciphertext hex")?;
    let tag = hex::decode(tag_hex).with_context(|| "decoding tag hex")?;
    if tag.len() != TAG_LEN {
        bail!("tag must be {TAG_LEN} bytes, got {}", tag.len());
    }
    combined.extend_from_slice(&tag);
    cipher
        .decrypt(Nonce::<U16>::from_slice(&iv), combined.as_slice())
        .map_err(|_| anyhow!("decryption failed: authentication tag mismatch"))
}

/// Encrypts an attachment under a random IV.
pub fn encrypt_file(contents: &[u8], key_hex: &str) -> Result<SealedFile> {
    let cipher = cipher(key_hex)?;
    let iv = RoomCipher::generate_nonce(&mut OsRng);
    let mut out = cipher
        .encrypt(&iv, contents)
        .map_err(|_| anyhow!("file encryption failed"))?;
    let tag = out.split_off(out.len() - TAG_LEN);
    Ok(SealedFile {
        ciphertext_hex: hex::encode(out),
        iv_hex: hex::encode(iv),
        tag_hex: hex::encode(tag),
    })
}

/// Hex HMAC-SHA256 of `data` keyed by the raw bytes of `secret`.
pub fn hmac_hex(data: &[u8], secret: &str) -> Result<String> {
    let mut mac = keyed_mac(secret)?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature. Malformed hex is a mismatch.
pub fn verify_hmac(data: &[u8], signature_hex: &str, secret: &str) -> Result<bool> {
    let Ok(signature) = hex::decode(signature_hex) else {
        return Ok(false);
    };
    let mut mac = keyed_mac(secret)?;
    mac.update(data);
    Ok(mac.verify_slice(&signature).is_ok())
}

fn keyed_mac(secret: &str) -> Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow!("invalid hmac secret: {e}"))
}

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).with_context(|| format!("bcrypt hash at cost {cost}"))
}

/// False for a wrong password; an error only for a malformed hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).with_context(|| "bcrypt verify")
}

fn cipher(key_hex: &str) -> Result<RoomCipher> {
    let key = hex::decode(key_hex).with_context(|| "decoding key hex")?;
    if key.len() != KEY_LEN {
        bail!("key must be {KEY_LEN} bytes, got {}", key.len());
    }
    RoomCipher::new_from_slice(&key).map_err(|_| anyhow!("invalid key length"))
}

fn decode_iv(iv_hex: &str) -> Result<Vec<u8>> {
    let iv = hex::decode(iv_hex).with_context(|| "decoding iv hex")?;
    if iv.len() != IV_LEN {
        bail!("iv must be {IV_LEN} bytes, got {}", iv.len());
    }
    Ok(iv)
}
