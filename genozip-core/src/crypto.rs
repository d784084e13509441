//! AES-CTR-like encryption (spec.md §4.8). Two distinct key derivations —
//! `k_header` and `k_body` — so identical plaintext at different positions
//! never produces identical ciphertext. A 16-byte `password_test` block in
//! the (unencrypted) genozip header is the password oracle.

use crate::error::{CryptoError, Result};
use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;
use ctr::Ctr64BE;
use rand::RngCore;
use sha2::{Digest, Sha256};

type Aes256Ctr = Ctr64BE<Aes256>;

const PASSWORD_TEST_PLAINTEXT: [u8; 16] = *b"genozip-pw-test!";

/// Derives a 256-bit AES key from the user password plus a domain string,
/// via SHA-256 — the "SHA-derived key material" of spec.md §4.8.
fn derive_key(password: &str, domain: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Derives the 16-byte IV/counter-seed for one (vblock_i, section_i) slot.
fn derive_iv(vblock_i: u32, section_i: i32) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(vblock_i.to_be_bytes());
    hasher.update(section_i.to_be_bytes());
    let digest = hasher.finalize();
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&digest[..16]);
    iv
}

/// `k_header(section_i)`: derives the header key/IV pair. Keyed on
/// `section_i` alone, not `vblock_i` — `vblock_i` lives inside the header
/// this key decrypts, so it isn't available yet when the reader needs the
/// key (spec.md §3.2, §4.8).
pub fn k_header(password: &str, section_i: u16) -> Aes256Ctr {
    let key = derive_key(password, "header");
    let iv = derive_iv(0, -1 - section_i as i32);
    Aes256Ctr::new(&key.into(), &iv.into())
}

/// `k_body(vblock_i, section_i)`: derives the body key/IV pair.
pub fn k_body(password: &str, vblock_i: u32, section_i: u16) -> Aes256Ctr {
    let key = derive_key(password, "body");
    let iv = derive_iv(vblock_i, section_i as i32);
    Aes256Ctr::new(&key.into(), &iv.into())
}

/// Encrypts `data` in place with the given cipher instance.
pub fn encrypt_in_place(cipher: &mut Aes256Ctr, data: &mut [u8]) {
    cipher.apply_keystream(data);
}

/// Decrypts `data` in place (CTR mode is its own inverse).
pub fn decrypt_in_place(cipher: &mut Aes256Ctr, data: &mut [u8]) {
    cipher.apply_keystream(data);
}

/// Pads `data` up to a multiple of the AES block size (16) with random
/// bytes, per spec.md §4.8 ("padded to the AES block size with a
/// randomized pad").
pub fn pad_to_block(data: &mut Vec<u8>) {
    let rem = data.len() % 16;
    if rem != 0 {
        let pad = 16 - rem;
        let mut rng = rand::thread_rng();
        let mut buf = vec![0u8; pad];
        rng.fill_bytes(&mut buf);
        data.extend_from_slice(&buf);
    }
}

/// Computes the 16-byte password-test oracle block stored in the
/// (unencrypted) genozip header.
pub fn make_password_test(password: &str) -> [u8; 16] {
    let key = derive_key(password, "password-test");
    let iv = [0u8; 16];
    let mut cipher = Aes256Ctr::new(&key.into(), &iv.into());
    let mut buf = PASSWORD_TEST_PLAINTEXT;
    cipher.apply_keystream(&mut buf);
    buf
}

/// Verifies a password against the stored oracle block. Returns
/// `CryptoError::WrongPassword` on mismatch.
pub fn verify_password(password: &str, stored: &[u8; 16]) -> Result<()> {
    let expect = make_password_test(password);
    if &expect == stored {
        Ok(())
    } else {
        Err(CryptoError::WrongPassword.into())
    }
}
