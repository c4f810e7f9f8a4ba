// collectd-emitter - collectd network protocol client
// Copyright (c) 2025 The collectd-emitter contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Security envelope
//!
//! Wraps a finished payload in one of three framings:
//!
//! ```text
//! None:    [payload]
//! Sign:    [0x0200: 2] [36 + ulen: 2] [HMAC-SHA256(user || payload): 32] [user] [payload]
//! Encrypt: [0x0210: 2] [total: 2] [ulen: 2] [user] [iv: 16]
//!          AES-256-OFB(key = SHA-256(password), [SHA-1(payload): 20] [payload])
//! ```
//!
//! The overhead of the chosen level is known before any payload is built,
//! so the packet buffer can be sized to keep the sealed datagram within
//! [`MAX_PACKET_SIZE`].

use crate::error::{ConfigError, SecurityError};
use crate::protocol::{PartType, MAX_PACKET_SIZE, PART_HEADER_SIZE};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rand::rand_bytes;
use openssl::sha::{sha1, sha256};
use openssl::sign::Signer;
use openssl::symm::{Cipher, Crypter, Mode};
use std::fmt;
use std::str::FromStr;

/// HMAC-SHA256 output size
pub const MAC_SIZE: usize = 32;

/// AES initialisation vector size
pub const IV_SIZE: usize = 16;

/// SHA-1 digest size
pub const SHA1_SIZE: usize = 20;

/// Fixed overhead of a signed packet, excluding the username
pub const SIGN_OVERHEAD: usize = PART_HEADER_SIZE + MAC_SIZE;

/// Fixed overhead of an encrypted packet, excluding the username
pub const ENCRYPT_OVERHEAD: usize = PART_HEADER_SIZE + 2 + IV_SIZE + SHA1_SIZE;

/// Envelope level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecurityLevel {
    /// Plain payload
    #[default]
    None,
    /// HMAC-SHA256 signed
    Sign,
    /// AES-256-OFB encrypted
    Encrypt,
}

impl SecurityLevel {
    /// Whether this level needs a username and password
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, SecurityLevel::None)
    }
}

impl FromStr for SecurityLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(SecurityLevel::None),
            "sign" | "1" => Ok(SecurityLevel::Sign),
            "encrypt" | "2" => Ok(SecurityLevel::Encrypt),
            _ => Err(ConfigError::InvalidSecurityLevel(s.to_string())),
        }
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SecurityLevel::None),
            1 => Ok(SecurityLevel::Sign),
            2 => Ok(SecurityLevel::Encrypt),
            other => Err(ConfigError::InvalidSecurityLevel(other.to_string())),
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityLevel::None => write!(f, "none"),
            SecurityLevel::Sign => write!(f, "sign"),
            SecurityLevel::Encrypt => write!(f, "encrypt"),
        }
    }
}

/// Username and shared secret
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Username sent in clear in the envelope
    pub fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> &[u8] {
        self.password.as_bytes()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Envelope for one security level, fixed for the lifetime of an encoder
#[derive(Debug, Clone)]
pub struct Envelope {
    level: SecurityLevel,
    credentials: Option<Credentials>,
    overhead: usize,
}

impl Envelope {
    /// Create an envelope
    ///
    /// Fails when credentials are missing for a level above `None`, or when
    /// the username leaves no room for a payload.
    pub fn new(level: SecurityLevel, credentials: Option<Credentials>) -> Result<Self, ConfigError> {
        let overhead = match (level, &credentials) {
            (SecurityLevel::None, _) => 0,
            (SecurityLevel::Sign, Some(c)) => SIGN_OVERHEAD + c.username.len(),
            (SecurityLevel::Encrypt, Some(c)) => ENCRYPT_OVERHEAD + c.username.len(),
            (level, None) => return Err(ConfigError::MissingCredentials(level)),
        };

        if overhead >= MAX_PACKET_SIZE {
            let base = overhead - credentials.as_ref().map_or(0, |c| c.username.len());
            return Err(ConfigError::UsernameTooLong {
                len: overhead - base,
                max: MAX_PACKET_SIZE - base - 1,
            });
        }

        Ok(Self {
            level,
            credentials: credentials.filter(|_| level.requires_credentials()),
            overhead,
        })
    }

    /// Envelope that sends payloads unmodified
    pub fn plain() -> Self {
        Self {
            level: SecurityLevel::None,
            credentials: None,
            overhead: 0,
        }
    }

    /// Security level
    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Bytes added around the payload
    pub fn overhead(&self) -> usize {
        self.overhead
    }

    /// Usable payload capacity so the sealed packet fits [`MAX_PACKET_SIZE`]
    pub fn capacity(&self) -> usize {
        MAX_PACKET_SIZE - self.overhead
    }

    fn credentials(&self) -> Result<&Credentials, SecurityError> {
        self.credentials
            .as_ref()
            .ok_or(SecurityError::MissingCredentials)
    }

    /// Wrap a payload for transmission
    pub fn seal(&self, payload: &[u8]) -> Result<Vec<u8>, SecurityError> {
        match self.level {
            SecurityLevel::None => Ok(payload.to_vec()),
            SecurityLevel::Sign => sign(self.credentials()?, payload),
            SecurityLevel::Encrypt => encrypt(self.credentials()?, payload),
        }
    }

    /// Recover the payload from a sealed packet, verifying it
    pub fn open(&self, packet: &[u8]) -> Result<Vec<u8>, SecurityError> {
        match self.level {
            SecurityLevel::None => Ok(packet.to_vec()),
            SecurityLevel::Sign => verify(self.credentials()?, packet),
            SecurityLevel::Encrypt => decrypt(self.credentials()?, packet),
        }
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::plain()
    }
}

/// HMAC-SHA256 over the concatenation of `parts`
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, SecurityError> {
    let pkey = PKey::hmac(key)?;
    let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
    for part in parts {
        signer.update(part)?;
    }
    Ok(signer.sign_to_vec()?)
}

fn aes_256_ofb(mode: Mode, key: &[u8], iv: &[u8], input: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let cipher = Cipher::aes_256_ofb();
    let mut crypter = Crypter::new(cipher, mode, key, Some(iv))?;
    crypter.pad(false);
    let mut out = vec![0u8; input.len() + cipher.block_size()];
    let mut count = crypter.update(input, &mut out)?;
    count += crypter.finalize(&mut out[count..])?;
    out.truncate(count);
    Ok(out)
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, SecurityError> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(SecurityError::Truncated)
}

fn expect_type(packet: &[u8], expected: PartType) -> Result<(), SecurityError> {
    let packet_type = read_u16(packet, 0)?;
    if packet_type != expected.id() {
        return Err(SecurityError::UnexpectedPacketType(packet_type));
    }
    Ok(())
}

fn sign(credentials: &Credentials, payload: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let user = credentials.username.as_bytes();
    let header_len = SIGN_OVERHEAD + user.len();
    let mac = hmac_sha256(credentials.password(), &[user, payload])?;

    let mut out = Vec::with_capacity(header_len + payload.len());
    out.extend_from_slice(&PartType::Signature.id().to_be_bytes());
    out.extend_from_slice(&(header_len as u16).to_be_bytes());
    out.extend_from_slice(&mac);
    out.extend_from_slice(user);
    out.extend_from_slice(payload);
    Ok(out)
}

fn verify(credentials: &Credentials, packet: &[u8]) -> Result<Vec<u8>, SecurityError> {
    expect_type(packet, PartType::Signature)?;
    let header_len = read_u16(packet, 2)? as usize;
    if header_len < SIGN_OVERHEAD || header_len > packet.len() {
        return Err(SecurityError::Truncated);
    }

    let mac = &packet[PART_HEADER_SIZE..SIGN_OVERHEAD];
    let user = &packet[SIGN_OVERHEAD..header_len];
    let payload = &packet[header_len..];
    if user != credentials.username.as_bytes() {
        return Err(SecurityError::SignatureMismatch);
    }

    let expected = hmac_sha256(credentials.password(), &[user, payload])?;
    if !openssl::memcmp::eq(mac, &expected) {
        return Err(SecurityError::SignatureMismatch);
    }
    Ok(payload.to_vec())
}

fn encrypt(credentials: &Credentials, payload: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let user = credentials.username.as_bytes();
    let total_len = ENCRYPT_OVERHEAD + user.len() + payload.len();

    let mut iv = [0u8; IV_SIZE];
    rand_bytes(&mut iv)?;
    let key = sha256(credentials.password());

    let mut plaintext = Vec::with_capacity(SHA1_SIZE + payload.len());
    plaintext.extend_from_slice(&sha1(payload));
    plaintext.extend_from_slice(payload);
    let ciphertext = aes_256_ofb(Mode::Encrypt, &key, &iv, &plaintext)?;

    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(&PartType::Encryption.id().to_be_bytes());
    out.extend_from_slice(&(total_len as u16).to_be_bytes());
    out.extend_from_slice(&(user.len() as u16).to_be_bytes());
    out.extend_from_slice(user);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn decrypt(credentials: &Credentials, packet: &[u8]) -> Result<Vec<u8>, SecurityError> {
    expect_type(packet, PartType::Encryption)?;
    let total_len = read_u16(packet, 2)? as usize;
    let user_len = read_u16(packet, 4)? as usize;
    let iv_start = PART_HEADER_SIZE + 2 + user_len;
    let data_start = iv_start + IV_SIZE;
    if total_len != packet.len() || data_start + SHA1_SIZE > packet.len() {
        return Err(SecurityError::Truncated);
    }

    let user = &packet[PART_HEADER_SIZE + 2..iv_start];
    if user != credentials.username.as_bytes() {
        return Err(SecurityError::IntegrityCheckFailed);
    }

    let key = sha256(credentials.password());
    let iv = &packet[iv_start..data_start];
    let plaintext = aes_256_ofb(Mode::Decrypt, &key, iv, &packet[data_start..])?;

    let (digest, payload) = plaintext.split_at(SHA1_SIZE);
    if !openssl::memcmp::eq(digest, &sha1(payload)) {
        return Err(SecurityError::IntegrityCheckFailed);
    }
    Ok(payload.to_vec())
}
