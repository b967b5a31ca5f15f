//! One-time passcode generation per RFC 4226 (HOTP) and RFC 6238 (TOTP),
//! plus a cancellable watcher that keeps track of the current TOTP.

use hmac::{digest::InvalidLength, Mac};
use std::fmt;
use std::str::FromStr;

mod hotp;
mod totp;
mod watch;

pub use crate::hotp::{HotpSpec, MAX_OTP_LENGTH, MIN_OTP_LENGTH, MIN_SECRET_BYTES};
pub use crate::totp::TotpSpec;
pub use crate::watch::{CancelToken, ErrorAction, TotpWatcher, WatchHandle};

type Sha1Hmac = hmac::Hmac<sha1::Sha1>;
type Sha256Hmac = hmac::Hmac<sha2::Sha256>;
type Sha512Hmac = hmac::Hmac<sha2::Sha512>;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("secret too short: {0} bytes, byte count must be >= 16")]
    SecretTooShort(usize),
    #[error("OTP length {0} not within valid range 6-8")]
    LengthOutOfRange(u32),
    #[error("period must be at least 1 second")]
    PeriodTooShort,
    #[error("secret not usable as an HMAC key")]
    InvalidKey(#[from] InvalidLength),
    #[error("unknown algorithm {0}, supported are SHA1, SHA256 and SHA512")]
    UnknownAlgorithm(String),
}

pub type OtpResult<T> = std::result::Result<T, OtpError>;

/// Hash function backing the HMAC of a passcode computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Algorithm::Sha1 => write!(f, "SHA1"),
            Algorithm::Sha256 => write!(f, "SHA256"),
            Algorithm::Sha512 => write!(f, "SHA512"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = OtpError;

    fn from_str(s: &str) -> OtpResult<Self> {
        match s {
            "SHA1" => Ok(Algorithm::Sha1),
            "SHA256" => Ok(Algorithm::Sha256),
            "SHA512" => Ok(Algorithm::Sha512),
            _ => Err(OtpError::UnknownAlgorithm(s.to_string())),
        }
    }
}

pub(crate) fn hotp_raw(secret: &[u8], algorithm: Algorithm, counter: u64, length: u32) -> OtpResult<String> {
    // Step 1: Compute the HMAC over the big-endian counter
    let hs = hmac(secret, algorithm, counter)?;

    // Step 2: Generate a 4-byte string (Dynamic Truncation)
    let sbits = dt(&hs);

    // Step 3: Reduce to `length` decimal digits, keeping leading zeros
    let snum = u32::from_be_bytes(sbits);

    Ok(format!("{:01$}", snum % 10_u32.pow(length), length as usize))
}

fn hmac(secret: &[u8], algorithm: Algorithm, counter: u64) -> OtpResult<Vec<u8>> {
    let message = counter.to_be_bytes();
    let hs = match algorithm {
        Algorithm::Sha1 => {
            let mut mac = Sha1Hmac::new_from_slice(secret)?;
            mac.update(&message);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Sha256 => {
            let mut mac = Sha256Hmac::new_from_slice(secret)?;
            mac.update(&message);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Sha512 => {
            let mut mac = Sha512Hmac::new_from_slice(secret)?;
            mac.update(&message);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(hs)
}

fn dt(hs: &[u8]) -> [u8; 4] {
    let offset = dt_offset(hs);
    let mut substr = dt_substr(hs, offset);
    substr[0] &= 0b0111_1111;
    substr
}

fn dt_substr(hs: &[u8], offset: usize) -> [u8; 4] {
    // Cannot trigger for the supported digest sizes (20/32/64 bytes),
    // since offset is at most 15
    assert!(hs.len() >= offset + 4, "digest too short for dynamic truncation");
    hs[offset..offset + 4].try_into().unwrap()
}

fn dt_offset(hs: &[u8]) -> usize {
    (hs[hs.len() - 1] & 0b1111) as usize
}

#[cfg(test)]
mod test {
    use hex::FromHex;
    use test_case::test_case;

    use crate::{dt, dt_offset, dt_substr, hmac, Algorithm, OtpError};

    #[test]
    fn it_computes_correct_offset() {
        let s: [u8; 20] = hex_literal::hex!("1f8698690e02ca16618550ef7f19da8e945b555a");
        // Last byte is 0x5a, with low 4 bits 0xa
        let actual = dt_offset(&s);
        assert_eq!(actual, 0x0a);
    }

    #[test]
    fn it_computes_correct_4byte_substring() {
        let s: [u8; 20] = hex_literal::hex!("1f8698690e02ca16618550ef7f19da8e945b555a");
        let expected: [u8; 4] = hex_literal::hex!("50ef7f19");
        let actual = dt_substr(&s, dt_offset(&s));
        assert_eq!(actual, expected);
    }

    #[test]
    fn it_computes_correct_dt() {
        let s: [u8; 20] = hex_literal::hex!("1f8698690e02ca166185ffef7f19da8e945b555a");
        let expected: [u8; 4] = hex_literal::hex!("7fef7f19");
        let actual = dt(&s);
        assert_eq!(actual, expected);
    }

    #[test_case(0, "cc93cf18508d94934c64b65d8ba7667fb7cde4b0")]
    #[test_case(1, "75a48a19d4cbe100644e8ac1397eea747a2d33ab")]
    #[test_case(9, "1637409809a679dc698207310c8c7fc07290d9e5")]
    fn it_computes_correct_hmac(counter: u64, expected: &str) {
        let expected = Vec::from_hex(expected).unwrap();
        let key = b"12345678901234567890";
        let hs = hmac(key, Algorithm::Sha1, counter).unwrap();
        assert_eq!(hs, expected);
    }

    #[test_case(Algorithm::Sha1, 20)]
    #[test_case(Algorithm::Sha256, 32)]
    #[test_case(Algorithm::Sha512, 64)]
    fn it_produces_full_size_digests(algorithm: Algorithm, expected_len: usize) {
        let hs = hmac(b"12345678901234567890", algorithm, 0).unwrap();
        assert_eq!(hs.len(), expected_len);
    }

    #[test_case("SHA1", Algorithm::Sha1)]
    #[test_case("SHA256", Algorithm::Sha256)]
    #[test_case("SHA512", Algorithm::Sha512)]
    fn it_parses_algorithm_names(name: &str, expected: Algorithm) {
        assert_eq!(name.parse::<Algorithm>().unwrap(), expected);
        assert_eq!(expected.to_string(), name);
    }

    #[test]
    fn it_rejects_unknown_algorithm_names() {
        let result = "SHA384".parse::<Algorithm>();
        assert!(matches!(result, Err(OtpError::UnknownAlgorithm(name)) if name == "SHA384"));
    }
}
