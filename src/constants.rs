//! Physical and DSP constants shared across the tracking core.

pub const PI: f64 = std::f64::consts::PI;
pub const TWO_PI: f64 = 2.0 * PI;

/// GPS L1 carrier frequency, Hz.
pub const L1_FREQ_HZ: f64 = 1_575.42e6;

/// Nominal C/A chipping rate, chips/s.
pub const CA_CODE_RATE_CHIPS_PER_S: f64 = 1.023e6;

/// Chips per C/A code period.
pub const CA_CODE_LENGTH_CHIPS: usize = 1023;

/// C/A code period, seconds.
pub const CA_CODE_PERIOD_S: f64 = 1.0e-3;

/// Number of GPS satellites (PRN 1..=32).
pub const NUM_GPS_SATS: usize = 32;

/// Window length (epochs) for the C/N0 / lock estimator.
pub const CN0_WINDOW: usize = 20;

/// Lock-fail counter threshold: channel declares loss of lock once exceeded.
pub const MAX_LOCK_FAIL: u32 = 50;

/// Carrier-lock narrowband indicator threshold.
pub const CARRIER_LOCK_THRESHOLD: f64 = 0.85;

/// Minimum acceptable C/N0, dB-Hz.
pub const MIN_VALID_CN0_DB_HZ: f64 = 25.0;

/// Loss-of-lock control event code.
pub const EVENT_LOSS_OF_LOCK: u32 = 2;
