use crate::{hotp_raw, Algorithm, HotpSpec, OtpError, OtpResult};

use unix_time::Instant;

/// Validated parameters for time-based passcodes.
///
/// Wraps the counter-based parameters and adds the hash algorithm plus the
/// period that maps wall-clock time onto counters. Repeated generation
/// within the same period yields the same passcode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TotpSpec {
    hotp: HotpSpec,
    algorithm: Algorithm,
    period: u32,
    period_millis: u64,
}

impl TotpSpec {
    /// Create a spec with the period given in seconds.
    ///
    /// Fails on the same conditions as [`HotpSpec::new`], or if `period`
    /// is zero.
    pub fn new(secret: &[u8], length: u32, algorithm: Algorithm, period: u32) -> OtpResult<Self> {
        Self::init(secret, length, algorithm, period, u64::from(period) * 1000)
    }

    /// Create a spec with the period given in milliseconds.
    ///
    /// The second-resolution period is derived by truncating division, so
    /// `period_millis` below 1000 is rejected.
    pub fn with_period_millis(
        secret: &[u8],
        length: u32,
        algorithm: Algorithm,
        period_millis: u64,
    ) -> OtpResult<Self> {
        Self::init(
            secret,
            length,
            algorithm,
            (period_millis / 1000) as u32,
            period_millis,
        )
    }

    fn init(
        secret: &[u8],
        length: u32,
        algorithm: Algorithm,
        period: u32,
        period_millis: u64,
    ) -> OtpResult<Self> {
        let hotp = HotpSpec::new(secret, length)?;
        if period < 1 {
            return Err(OtpError::PeriodTooShort);
        }
        Ok(TotpSpec {
            hotp,
            algorithm,
            period,
            period_millis,
        })
    }

    /// Number of digits of a generated passcode.
    pub fn length(&self) -> u32 {
        self.hotp.length()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Period in seconds a passcode stays valid.
    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn period_millis(&self) -> u64 {
        self.period_millis
    }

    /// Counter value the spec maps `utc_millis` onto. This is the only
    /// coupling between wall-clock time and the counter-based algorithm.
    pub fn counter_at(&self, utc_millis: u64) -> u64 {
        utc_millis / self.period_millis
    }

    /// Generate the passcode valid at `utc_millis` (milliseconds since the
    /// unix epoch), zero-padded on the left to the spec's digit count.
    pub fn generate_at(&self, utc_millis: u64) -> OtpResult<String> {
        hotp_raw(
            self.hotp.secret(),
            self.algorithm,
            self.counter_at(utc_millis),
            self.hotp.length(),
        )
    }

    /// Generate the passcode valid right now.
    pub fn generate_now(&self) -> OtpResult<String> {
        self.generate_at(unix_millis(Instant::now()))
    }
}

/// Milliseconds since the unix epoch at `at`.
pub(crate) fn unix_millis(at: Instant) -> u64 {
    (at - Instant::at(0, 0)).as_millis() as u64
}
