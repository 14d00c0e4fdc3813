//! Second-order DLL/PLL loop filters (C4), modeled on the `run_pll`/
//! `run_dll` incremental update pattern -- each call folds in one
//! epoch's discriminator output and returns the new accumulated
//! correction, rather than a bare delta.

use crate::constants::CA_CODE_PERIOD_S;

/// Damping factor used for both loops (critically-damped-ish, per Borre).
const ZETA: f64 = 0.707;

/// A capability-based loop-filter interface so the in-process
/// second-order filter and an out-of-process substitute (the
/// TCP-connector variant, see `remote_filter`) are interchangeable.
pub trait LoopFilterBackend {
    fn initialize(&mut self);
    fn update(&mut self, error: f64) -> f64;
}

/// Stateful second-order loop filter. Not `Send`/`Sync` by design --
/// each tracking channel owns its own PLL and DLL filter instances.
#[derive(Debug, Clone, Copy)]
pub struct SecondOrderLoopFilter {
    bandwidth_hz: f64,
    update_interval_s: f64,
    prev_error: f64,
    correction: f64,
}

impl SecondOrderLoopFilter {
    /// `bandwidth_hz` is the noise bandwidth (`pll_bw_hz` or `dll_bw_hz`);
    /// `update_interval_s` is the time between successive `update` calls
    /// (`T_code` = 1ms for GPS C/A).
    pub fn new(bandwidth_hz: f64, update_interval_s: f64) -> Self {
        Self {
            bandwidth_hz,
            update_interval_s,
            prev_error: 0.0,
            correction: 0.0,
        }
    }

    pub fn for_pll(pll_bw_hz: f64) -> Self {
        Self::new(pll_bw_hz, CA_CODE_PERIOD_S)
    }

    pub fn for_dll(dll_bw_hz: f64) -> Self {
        Self::new(dll_bw_hz, CA_CODE_PERIOD_S)
    }

    fn natural_freq(&self) -> f64 {
        self.bandwidth_hz / 0.53
    }
}

impl LoopFilterBackend for SecondOrderLoopFilter {
    fn initialize(&mut self) {
        self.prev_error = 0.0;
        self.correction = 0.0;
    }

    fn update(&mut self, error: f64) -> f64 {
        let wn = self.natural_freq();
        let a2 = 2.0 * ZETA * wn;
        let a3 = wn * wn;

        self.correction +=
            a2 * (error - self.prev_error) + a3 * error * self.update_interval_s;
        self.prev_error = error;
        self.correction
    }
}
