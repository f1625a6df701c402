//! Standard security handler (revision 2, 40-bit RC4)
//!
//! Key derivation follows the PDF 1.3 standard handler: passwords are padded
//! to 32 bytes, the owner entry is RC4 of the user password under an MD5 of
//! the owner password, and every string and stream is encrypted with a key
//! derived from the file key and its object number.

use bitflags::bitflags;
use md5::{Digest, Md5};

/// Public padding string used to extend passwords to 32 bytes
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Bits that are always set in the permission mask
const BASE_PERMISSIONS: u8 = 192;

bitflags! {
    /// Operations granted to a user who opens the document with the user password
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Permissions: u8 {
        /// Print the document
        const PRINT = 4;
        /// Modify the contents
        const MODIFY = 8;
        /// Copy or extract text and graphics
        const COPY = 16;
        /// Add or modify annotations and fill form fields
        const ANNOT_FORMS = 32;
    }
}

impl Permissions {
    /// Permission byte as written into the key derivation (base bits included)
    pub fn mask(self) -> u8 {
        BASE_PERMISSIONS | self.bits()
    }

    /// Signed `/P` value of the encryption dictionary
    pub fn p_value(self) -> i32 {
        -(((self.mask() ^ 0xFF) as i32) + 1)
    }
}

/// RC4 stream cipher that remembers the key schedule of the last key
///
/// Consecutive strings of one object share a key, so the schedule is
/// computed once and copied for each call.
#[derive(Debug, Clone)]
pub struct Rc4 {
    last_key: Vec<u8>,
    schedule: [u8; 256],
}

impl Default for Rc4 {
    fn default() -> Self {
        Self::new()
    }
}

impl Rc4 {
    pub fn new() -> Self {
        Self {
            last_key: Vec::new(),
            schedule: [0u8; 256],
        }
    }

    fn key_schedule(key: &[u8]) -> [u8; 256] {
        let mut s = [0u8; 256];
        for (i, val) in s.iter_mut().enumerate() {
            *val = i as u8;
        }
        if key.is_empty() {
            return s;
        }

        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        s
    }

    /// Encrypt or decrypt `data` (the operation is symmetric)
    pub fn apply(&mut self, key: &[u8], data: &[u8]) -> Vec<u8> {
        if self.last_key != key {
            self.schedule = Self::key_schedule(key);
            self.last_key = key.to_vec();
        }

        let mut s = self.schedule;
        let (mut i, mut j) = (0u8, 0u8);
        data.iter()
            .map(|byte| {
                i = i.wrapping_add(1);
                j = j.wrapping_add(s[i as usize]);
                s.swap(i as usize, j as usize);
                let k = s[i as usize].wrapping_add(s[j as usize]);
                byte ^ s[k as usize]
            })
            .collect()
    }
}

/// Pad or truncate a password to 32 bytes
fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let n = password.len().min(32);
    padded[..n].copy_from_slice(&password[..n]);
    padded[n..].copy_from_slice(&PADDING[..32 - n]);
    padded
}

fn md5(parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Encryption context derived once before any content is produced
#[derive(Debug, Clone)]
pub struct SecurityHandler {
    key: [u8; 5],
    o_value: Vec<u8>,
    u_value: Vec<u8>,
    permissions: Permissions,
    rc4: Rc4,
}

impl SecurityHandler {
    /// Derive the file key and the published `/O` `/U` `/P` values
    ///
    /// # Arguments
    /// * `permissions` - Operations granted to the user
    /// * `user_password` - Password required to open the document (may be empty)
    /// * `owner_password` - Password granting full access
    pub fn new(permissions: Permissions, user_password: &str, owner_password: &str) -> Self {
        let user = pad_password(user_password.as_bytes());
        let owner = pad_password(owner_password.as_bytes());
        let mut rc4 = Rc4::new();

        let owner_key = md5(&[&owner]);
        let o_value = rc4.apply(&owner_key[..5], &user);

        let digest = md5(&[&user, &o_value, &[permissions.mask()], &[0xFF, 0xFF, 0xFF]]);
        let mut key = [0u8; 5];
        key.copy_from_slice(&digest[..5]);
        let u_value = rc4.apply(&key, &PADDING);

        Self {
            key,
            o_value,
            u_value,
            permissions,
            rc4,
        }
    }

    /// The 40-bit file key
    pub fn file_key(&self) -> &[u8] {
        &self.key
    }

    /// `/O` entry (32 bytes)
    pub fn o_value(&self) -> &[u8] {
        &self.o_value
    }

    /// `/U` entry (32 bytes)
    pub fn u_value(&self) -> &[u8] {
        &self.u_value
    }

    /// `/P` entry
    pub fn p_value(&self) -> i32 {
        self.permissions.p_value()
    }

    /// Key used for strings and streams of object `n` (generation 0)
    pub fn object_key(&self, n: u32) -> [u8; 10] {
        let digest = md5(&[&self.key, &n.to_le_bytes()[..3], &[0, 0]]);
        let mut key = [0u8; 10];
        key.copy_from_slice(&digest[..10]);
        key
    }

    /// Encrypt `data` belonging to object `n`; object 0 is left untouched
    pub fn encrypt(&mut self, n: u32, data: &[u8]) -> Vec<u8> {
        if n == 0 {
            return data.to_vec();
        }
        let key = self.object_key(n);
        self.rc4.apply(&key, data)
    }
}
