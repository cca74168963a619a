//! OTP credential codec: `otpauth://` URI parsing and serialization, and
//! HOTP/TOTP code generation (RFC 4226 / RFC 6238).

use std::fmt;
use std::fmt::Write as _;

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use url::Url;

use crate::error::Error;

/// HMAC hash algorithm named by the URI's `algorithm` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    fn from_uri_value(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "SHA1" => Some(Self::Sha1),
            "SHA256" => Some(Self::Sha256),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
            Self::Sha256 => write!(f, "SHA256"),
            Self::Sha512 => write!(f, "SHA512"),
        }
    }
}

/// Counter-based or time-based generation, selected by the URI host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpMode {
    Hotp,
    Totp,
}

impl fmt::Display for OtpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hotp => write!(f, "hotp"),
            Self::Totp => write!(f, "totp"),
        }
    }
}

/// A decoded OTP provisioning URI. The secret is immutable after parse;
/// `uri()` is the canonical form the registry persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub mode: OtpMode,
    pub label: String,
    pub secret: Vec<u8>,
    pub algorithm: Algorithm,
    pub digits: u32,
    /// HOTP only. Fixed at parse time, never auto-advanced.
    pub counter: u64,
    /// TOTP only. Seconds per time step.
    pub period: u64,
}

impl Credential {
    /// Parse an `otpauth://` provisioning URI.
    ///
    /// The parameter belonging to the other mode (`period` on an `hotp`
    /// URI, `counter` on a `totp` URI) carries no meaning and is ignored
    /// whatever its value; the mode-relevant parameters are validated
    /// strictly.
    pub fn parse(uri: &str) -> Result<Self, Error> {
        let url = Url::parse(uri).map_err(|_| Error::invalid_uri("uri"))?;
        if url.scheme() != "otpauth" {
            return Err(Error::invalid_uri("scheme"));
        }
        let mode = match url.host_str().map(str::to_ascii_lowercase).as_deref() {
            Some("hotp") => OtpMode::Hotp,
            Some("totp") => OtpMode::Totp,
            _ => return Err(Error::invalid_uri("type")),
        };
        let label = percent_decode(url.path().trim_start_matches('/'));

        let mut secret = None;
        let mut algorithm = Algorithm::Sha1;
        let mut digits = 6u32;
        let mut counter = 0u64;
        let mut period = 30u64;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "secret" => secret = Some(decode_secret(&value)?),
                "algorithm" => {
                    algorithm = Algorithm::from_uri_value(&value)
                        .ok_or_else(|| Error::invalid_uri("algorithm"))?;
                }
                "digits" => {
                    digits = value
                        .parse()
                        .ok()
                        .filter(|d| (1..=9).contains(d))
                        .ok_or_else(|| Error::invalid_uri("digits"))?;
                }
                "counter" if mode == OtpMode::Hotp => {
                    counter = value.parse().map_err(|_| Error::invalid_uri("counter"))?;
                }
                "period" if mode == OtpMode::Totp => {
                    period = value
                        .parse()
                        .ok()
                        .filter(|p| *p > 0)
                        .ok_or_else(|| Error::invalid_uri("period"))?;
                }
                _ => {}
            }
        }

        let secret = secret.ok_or_else(|| Error::invalid_uri("secret"))?;

        Ok(Self {
            mode,
            label,
            secret,
            algorithm,
            digits,
            counter,
            period,
        })
    }

    /// Canonical serialization; `parse` of the result reproduces `self`.
    pub fn uri(&self) -> String {
        let secret = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &self.secret);
        let mut uri = format!(
            "otpauth://{}/{}?secret={}&algorithm={}&digits={}",
            self.mode,
            percent_encode(&self.label),
            secret,
            self.algorithm,
            self.digits,
        );
        match self.mode {
            OtpMode::Hotp => {
                let _ = write!(uri, "&counter={}", self.counter);
            }
            OtpMode::Totp => {
                let _ = write!(uri, "&period={}", self.period);
            }
        }
        uri
    }

    /// The current authentication code.
    pub fn code(&self) -> Result<String, Error> {
        self.code_at(unix_now())
    }

    /// The code at an explicit unix timestamp. HOTP ignores the timestamp
    /// and uses the stored counter as-is.
    pub fn code_at(&self, unix_seconds: u64) -> Result<String, Error> {
        if self.secret.is_empty() {
            return Err(Error::InvalidCredential("secret must not be empty"));
        }
        let counter = match self.mode {
            OtpMode::Hotp => self.counter,
            OtpMode::Totp => {
                if self.period == 0 {
                    return Err(Error::InvalidCredential("period must be positive"));
                }
                unix_seconds / self.period
            }
        };
        Ok(hotp(&self.secret, counter, self.algorithm, self.digits))
    }
}

/// Dynamic truncation per RFC 4226 §5.3 over HMAC(key, counter).
fn hotp(key: &[u8], counter: u64, algorithm: Algorithm, digits: u32) -> String {
    let digest = hmac_digest(key, &counter.to_be_bytes(), algorithm);
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);
    let code = u64::from(binary) % 10u64.pow(digits);
    format!("{code:0width$}", width = digits as usize)
}

fn hmac_digest(key: &[u8], message: &[u8], algorithm: Algorithm) -> Vec<u8> {
    match algorithm {
        Algorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Sha256 => {
            let mut mac =
                Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Sha512 => {
            let mut mac =
                Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Base32 secrets arrive case-insensitive, sometimes spaced or padded.
fn decode_secret(value: &str) -> Result<Vec<u8>, Error> {
    let cleaned = value.replace(' ', "");
    let cleaned = cleaned.trim_end_matches('=').to_ascii_uppercase();
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &cleaned)
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| Error::invalid_uri("secret"))
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b':'
            | b'@' => out.push(byte as char),
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
