use crate::{hotp_raw, Algorithm, OtpError, OtpResult};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Minimum number of digits of a passcode.
pub const MIN_OTP_LENGTH: u32 = 6;
/// Maximum number of digits of a passcode.
pub const MAX_OTP_LENGTH: u32 = 8;
/// Minimum byte count of the shared secret.
pub const MIN_SECRET_BYTES: usize = 16;

/// Validated parameters for counter-based passcodes.
///
/// Holds a private copy of the secret, so later mutation of the caller's
/// buffer cannot bypass validation. The copy is wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct HotpSpec {
    secret: Vec<u8>,
    length: u32,
}

impl HotpSpec {
    /// Create a spec from the raw secret and the passcode digit count.
    ///
    /// Fails if the secret is shorter than [`MIN_SECRET_BYTES`] or the
    /// digit count is not within [`MIN_OTP_LENGTH`]..=[`MAX_OTP_LENGTH`].
    pub fn new(secret: &[u8], length: u32) -> OtpResult<Self> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(OtpError::SecretTooShort(secret.len()));
        }
        if !(MIN_OTP_LENGTH..=MAX_OTP_LENGTH).contains(&length) {
            return Err(OtpError::LengthOutOfRange(length));
        }
        Ok(HotpSpec {
            secret: secret.to_vec(),
            length,
        })
    }

    /// Number of digits of a generated passcode.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub(crate) fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Generate the passcode for `counter` with HMAC-SHA1, zero-padded
    /// on the left to the spec's digit count.
    pub fn generate(&self, counter: u64) -> OtpResult<String> {
        hotp_raw(&self.secret, Algorithm::Sha1, counter, self.length)
    }
}

impl fmt::Debug for HotpSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HotpSpec")
            .field("secret", &format_args!("[{} bytes]", self.secret.len()))
            .field("length", &self.length)
            .finish()
    }
}
