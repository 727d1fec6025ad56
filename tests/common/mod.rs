use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use money_notes::core::parsers::document::{derive_key, EncryptedPayload, NONCE_LEN};
use serde_json::json;

/// Seals `html` into a payload the way published documents carry it.
pub fn seal(html: &str, password: &[u8], salt: &[u8], iv: &[u8; NONCE_LEN]) -> EncryptedPayload {
    let key = derive_key(password, salt).unwrap();
    let cipher = XChaCha20Poly1305::new_from_slice(&key).unwrap();
    let plain = serde_json::to_vec(&json!({ "data": html })).unwrap();
    let sealed = cipher
        .encrypt(XNonce::from_slice(iv), plain.as_slice())
        .unwrap();

    EncryptedPayload {
        cipher: URL_SAFE_NO_PAD.encode(sealed),
        iv: URL_SAFE_NO_PAD.encode(iv),
        salt: URL_SAFE_NO_PAD.encode(salt),
        length: Some(html.len()),
    }
}
