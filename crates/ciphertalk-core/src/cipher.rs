//! Keyed substitution cipher for message bodies
//!
//! Outgoing message text passes through [`encode`] before transmission and
//! inbound text through [`decode`]. This is an obfuscation layer, not
//! cryptography: a fixed shift over the two 26-letter Latin alphabets,
//! leaving every other character untouched at its original position.
//!
//! Both directions wrap modulo 26, so `decode(encode(s, k), k) == s` holds
//! for every string and every key in the allowed range. The functions are
//! pure and never fail; any input is representable on output.

use serde::{Deserialize, Serialize};

use crate::types::CipherKey;

const ALPHABET_LEN: u8 = 26;

/// Encode plaintext by shifting alphabetic characters forward by `key`
pub fn encode(text: &str, key: CipherKey) -> String {
    shift(text, key.value() % ALPHABET_LEN)
}

/// Decode ciphertext by shifting alphabetic characters back by `key`
pub fn decode(ciphertext: &str, key: CipherKey) -> String {
    // Shifting forward by the complement avoids signed wrap handling.
    shift(ciphertext, ALPHABET_LEN - (key.value() % ALPHABET_LEN))
}

fn shift(text: &str, amount: u8) -> String {
    text.chars()
        .map(|c| match c {
            'A'..='Z' => rotate(c, b'A', amount),
            'a'..='z' => rotate(c, b'a', amount),
            other => other,
        })
        .collect()
}

fn rotate(c: char, base: u8, amount: u8) -> char {
    let position = (c as u8) - base;
    (base + (position + amount) % ALPHABET_LEN) as char
}

// ----------------------------------------------------------------------------
// Encoded Message
// ----------------------------------------------------------------------------

/// Ciphertext together with the key needed to decode it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedMessage {
    pub ciphertext: String,
    pub key: CipherKey,
}

impl EncodedMessage {
    /// Encode plaintext into a self-describing encoded message
    pub fn seal(plaintext: &str, key: CipherKey) -> Self {
        Self {
            ciphertext: encode(plaintext, key),
            key,
        }
    }

    /// Recover the original plaintext
    pub fn open(&self) -> String {
        decode(&self.ciphertext, self.key)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
