//! Code and carrier discriminators (C5): the `run_pll`/`run_dll` error
//! terms, matching the classic Borre-et-al formulas that
//! `pll_cloop_two_quadrant_atan` / `dll_nc_e_minus_l_normalized`
//! implement.

use num_complex::Complex64;

use crate::constants::PI;

/// Two-quadrant `atan` carrier phase discriminator, in radians.
/// Guards the zero-real-part case by returning `±pi/2` by the sign of
/// the imaginary part, rather than dividing by zero.
pub fn pll_cloop_two_quadrant_atan(prompt: Complex64) -> f64 {
    if prompt.re == 0.0 {
        return if prompt.im >= 0.0 { PI / 2.0 } else { -PI / 2.0 };
    }
    (prompt.im / prompt.re).atan()
}

/// Non-coherent early-minus-late normalized code discriminator.
/// Returns 0 when `|E| + |L| == 0` rather than dividing by zero
/// (`NumericalGuardTripped`, not an error condition).
pub fn dll_nc_e_minus_l_normalized(early: Complex64, late: Complex64) -> f64 {
    let e = early.norm();
    let l = late.norm();
    let denom = e + l;
    if denom == 0.0 {
        return 0.0;
    }
    (e - l) / denom
}
