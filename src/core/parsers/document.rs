//! Shared note documents fetched over HTTP. A published document is either
//! plain HTML or carries an encrypted payload object somewhere in its body;
//! the password travels in the link fragment (`#key=<base64url>`).

use crate::core::parsers::html;
use crate::domain::model::RawNote;
use crate::utils::error::{NoteError, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const ARGON2_TIME_COST: u32 = 3;
pub const ARGON2_MEMORY_KIB: u32 = 8192;
pub const ARGON2_PARALLELISM: u32 = 1;
pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;

const PASSWORD_MARKER: &str = "#key=";
const PAYLOAD_PATTERN: &str = r#"\{[^{}]*"cipher"\s*:[^{}]*\}"#;

/// Encrypted payload as embedded in the page. Byte fields are unpadded base64url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub cipher: String,
    pub iv: String,
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    data: String,
}

fn decryption(message: impl Into<String>) -> NoteError {
    NoteError::DecryptionError {
        message: message.into(),
    }
}

fn decode_base64url(text: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(text.trim().trim_end_matches('='))
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

fn payload_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(PAYLOAD_PATTERN).expect("payload pattern is valid"))
}

/// First object in `body` that deserializes into an [`EncryptedPayload`].
pub fn find_payload(body: &str) -> Option<EncryptedPayload> {
    payload_pattern()
        .find_iter(body)
        .find_map(|found| serde_json::from_str(found.as_str()).ok())
}

pub fn password_from_url(url: &str) -> Result<Vec<u8>> {
    let encoded = url
        .split_once(PASSWORD_MARKER)
        .map(|(_, key)| key)
        .filter(|key| !key.is_empty())
        .ok_or(NoteError::MissingPasswordError)?;

    decode_base64url(encoded).map_err(|_| decryption("password in link is not base64url"))
}

pub fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(KEY_LEN),
    )
    .map_err(|e| decryption(e.to_string()))?;

    let mut key = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| decryption(e.to_string()))?;
    Ok(key)
}

/// Decrypts the payload and returns the HTML carried in its envelope.
pub fn decrypt_payload(payload: &EncryptedPayload, password: &[u8]) -> Result<String> {
    let cipher_bytes =
        decode_base64url(&payload.cipher).map_err(|_| decryption("cipher is not base64url"))?;
    let iv = decode_base64url(&payload.iv).map_err(|_| decryption("iv is not base64url"))?;
    let salt = decode_base64url(&payload.salt).map_err(|_| decryption("salt is not base64url"))?;
    if iv.len() != NONCE_LEN {
        return Err(decryption(format!(
            "iv must be {} bytes, got {}",
            NONCE_LEN,
            iv.len()
        )));
    }

    let key = derive_key(password, &salt)?;
    let cipher =
        XChaCha20Poly1305::new_from_slice(&key).map_err(|_| decryption("invalid key length"))?;
    let plain = cipher
        .decrypt(XNonce::from_slice(&iv), cipher_bytes.as_slice())
        .map_err(|_| decryption("authentication failed"))?;
    if plain.is_empty() {
        return Err(decryption("payload is empty"));
    }

    let envelope: Envelope = serde_json::from_slice(&plain).map_err(|e| NoteError::FormatError {
        message: format!("decrypted note is not a JSON envelope: {}", e),
    })?;

    Ok(match payload.length {
        Some(length) => truncate_on_char_boundary(&envelope.data, length).to_string(),
        None => envelope.data,
    })
}

fn truncate_on_char_boundary(text: &str, length: usize) -> &str {
    if length >= text.len() {
        return text;
    }
    let mut end = length;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Notes of a fetched document body; `url` supplies the password when needed.
pub fn extract_notes(body: &str, url: &str) -> Result<Vec<RawNote>> {
    match find_payload(body) {
        None => html::parse_tables(body),
        Some(payload) => {
            let password = password_from_url(url)?;
            let html = decrypt_payload(&payload, &password)?;
            html::parse_tables(&html)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentParser {
    client: Client,
}

impl DocumentParser {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// GETs `url` without its fragment; anything but 200 is a fetch failure.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let target = strip_fragment(url);
        let response = self.client.get(target).send().await?;

        if response.status() != StatusCode::OK {
            return Err(NoteError::FetchError {
                url: target.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    pub async fn parse(&self, url: &str) -> Result<Vec<RawNote>> {
        let body = self.fetch(url).await?;
        extract_notes(&body, url)
    }
}
