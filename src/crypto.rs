// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AES-256-GCM authenticated encryption for packet payloads.
//!
//! Binary layout of one encrypted payload: `nonce(12) || ciphertext || tag(16)`.
//! Ported from the teacher's DDS Security AEAD wrapper to the wire layout
//! this transport uses (nonce carried inline with the ciphertext rather
//! than out-of-band).

use ring::aead::{Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroize;

use crate::error::{Result, TransportError};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// AES-256-GCM cipher bound to a single 32-byte key.
pub struct AeadKey {
    key: [u8; KEY_LEN],
}

impl AeadKey {
    #[must_use]
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` with a fresh random nonce, returning
    /// `nonce || ciphertext || tag` as a single buffer.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_bytes = generate_nonce()?;
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| TransportError::Encryption("failed to load AES-256-GCM key".into()))?;
        let mut sealing_key = SealingKey::new(unbound, FixedNonceSequence::new(nonce_bytes));

        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut in_out)
            .map_err(|_| TransportError::Encryption("AES-256-GCM seal failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(out)
    }

    /// Decrypt a `nonce || ciphertext || tag` buffer produced by [`seal`](Self::seal).
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(TransportError::Encryption("ciphertext too short".into()));
        }
        let nonce_bytes: [u8; NONCE_LEN] = sealed[..NONCE_LEN].try_into().unwrap();
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| TransportError::Encryption("failed to load AES-256-GCM key".into()))?;
        let mut opening_key = OpeningKey::new(unbound, FixedNonceSequence::new(nonce_bytes));

        let mut in_out = sealed[NONCE_LEN..].to_vec();
        let plaintext = opening_key
            .open_in_place(Aad::empty(), &mut in_out)
            .map_err(|_| {
                TransportError::Encryption(
                    "AES-256-GCM open failed (authentication tag mismatch or wrong key)".into(),
                )
            })?;

        Ok(plaintext.to_vec())
    }
}

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
    let rng = SystemRandom::new();
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce)
        .map_err(|_| TransportError::Encryption("system RNG failed to generate nonce".into()))?;
    Ok(nonce)
}

struct FixedNonceSequence {
    nonce: Option<[u8; NONCE_LEN]>,
}

impl FixedNonceSequence {
    fn new(nonce: [u8; NONCE_LEN]) -> Self {
        Self { nonce: Some(nonce) }
    }
}

impl NonceSequence for FixedNonceSequence {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        let bytes = self.nonce.take().ok_or(ring::error::Unspecified)?;
        Nonce::try_assume_unique_for_key(&bytes)
    }
}
