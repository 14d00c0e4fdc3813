//! Carrier NCO (C2): generates the local carrier replica used for
//! wipe-off. Mirrors the `update_local_carrier` / `fxp_nco` pattern but
//! accumulates phase in `f64` to keep drift over one PRN period well
//! under 1e-4 rad.

use num_complex::Complex64;

/// Write `out.len()` complex samples of `exp(-j*(initial_phase + i*phase_step))`
/// into `out`. The sign performs wipe-off by multiplication against the
/// incoming signal.
pub fn generate_carrier_replica(out: &mut [Complex64], initial_phase_rad: f64, phase_step_rad: f64) {
    let mut phase = initial_phase_rad;
    for sample in out.iter_mut() {
        *sample = Complex64::new(phase.cos(), -phase.sin());
        phase += phase_step_rad;
    }
}
