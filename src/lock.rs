//! Lock & C/N0 Estimator (C6): windowed Signal-to-Noise-Variance C/N0
//! estimator and narrowband carrier-lock indicator, modeled on
//! `update_cn0`'s ring-buffer accumulation style, but over a fixed
//! `CN0_WINDOW`-sample Prompt ring rather than a running sum reset
//! every second.

use num_complex::Complex64;

use crate::constants::{CA_CODE_LENGTH_CHIPS, CN0_WINDOW};

/// Ring buffer of the last `CN0_WINDOW` Prompt correlator outputs.
#[derive(Debug, Clone)]
pub struct PromptRing {
    buf: [Complex64; CN0_WINDOW],
    next: usize,
    filled: bool,
}

impl Default for PromptRing {
    fn default() -> Self {
        Self {
            buf: [Complex64::default(); CN0_WINDOW],
            next: 0,
            filled: false,
        }
    }
}

impl PromptRing {
    /// Push one Prompt sample. Returns `true` exactly when the ring has
    /// just completed its `CN0_WINDOW`'th sample since the last reset
    /// (i.e. an estimator run is due).
    pub fn push(&mut self, prompt: Complex64) -> bool {
        self.buf[self.next] = prompt;
        self.next += 1;
        if self.next == CN0_WINDOW {
            self.next = 0;
            self.filled = true;
            return true;
        }
        false
    }

    pub fn samples(&self) -> &[Complex64; CN0_WINDOW] {
        &self.buf
    }
}

/// Quality estimate produced once per `CN0_WINDOW` epochs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockEstimate {
    pub cn0_db_hz: f64,
    pub carrier_lock_test: f64,
}

/// Signal-to-Noise-Variance C/N0 estimator over a window of Prompt samples.
pub fn estimate_cn0_db_hz(window: &[Complex64; CN0_WINDOW], fs_in_hz: f64) -> f64 {
    let n = CN0_WINDOW as f64;
    let mean_mag: f64 = window.iter().map(|p| p.norm()).sum::<f64>() / n;
    let mean_sq_mag: f64 = window.iter().map(|p| p.norm_sqr()).sum::<f64>() / n;

    let pd = mean_mag * mean_mag;
    let pn = mean_sq_mag - pd;

    if pn <= 0.0 {
        // Degenerate window (e.g. all-zero input): no noise power estimate
        // available; report the floor rather than propagating NaN/inf.
        return f64::NEG_INFINITY;
    }

    let snr = pd / pn;
    10.0 * snr.log10() + 10.0 * (fs_in_hz / CA_CODE_LENGTH_CHIPS as f64).log10()
}

/// Narrowband carrier-lock indicator in `[-1, 1]`; near 1 when locked.
pub fn carrier_lock_test(window: &[Complex64; CN0_WINDOW]) -> f64 {
    let sum_re: f64 = window.iter().map(|p| p.re).sum();
    let sum_im: f64 = window.iter().map(|p| p.im).sum();

    let nbd = sum_re * sum_re - sum_im * sum_im;
    let nbp = sum_re * sum_re + sum_im * sum_im;

    if nbp == 0.0 {
        return 0.0;
    }
    nbd / nbp
}

pub fn estimate(window: &[Complex64; CN0_WINDOW], fs_in_hz: f64) -> LockEstimate {
    LockEstimate {
        cn0_db_hz: estimate_cn0_db_hz(window, fs_in_hz),
        carrier_lock_test: carrier_lock_test(window),
    }
}
