//! EPL Correlator (C3): dot-products the incoming sample block against
//! the carrier replica and the three shifted code replicas.
//!
//! Modeled on `compute_correlation`, but expressed as accumulated sums
//! rather than normalized averages: `E/P/L = sum_i
//! samples[i]*carrier[i]*code[i]`, with normalization left to the
//! discriminators and lock estimator that consume the raw sums.

use num_complex::Complex64;

/// Early/Prompt/Late correlation outputs for one epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EplCorrelation {
    pub early: Complex64,
    pub prompt: Complex64,
    pub late: Complex64,
}

/// Correlate `samples` against `carrier` (wipe-off) and the three code
/// replicas. All five slices must have equal length; the correlator
/// does not require any particular memory alignment on `samples`
/// (callers may hand it an unaligned window of a larger buffer).
pub fn correlate(
    samples: &[Complex64],
    carrier: &[Complex64],
    early_code: &[Complex64],
    prompt_code: &[Complex64],
    late_code: &[Complex64],
) -> EplCorrelation {
    let n = samples.len();
    debug_assert_eq!(carrier.len(), n);
    debug_assert_eq!(early_code.len(), n);
    debug_assert_eq!(prompt_code.len(), n);
    debug_assert_eq!(late_code.len(), n);

    let mut early = Complex64::default();
    let mut prompt = Complex64::default();
    let mut late = Complex64::default();

    for i in 0..n {
        let wiped = samples[i] * carrier[i];
        early += wiped * early_code[i];
        prompt += wiped * prompt_code[i];
        late += wiped * late_code[i];
    }

    EplCorrelation {
        early,
        prompt,
        late,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_prompt_code_gives_maximum_energy() {
        let n = 64;
        let carrier = vec![Complex64::new(1.0, 0.0); n];
        let code: Vec<Complex64> = (0..n)
            .map(|i| Complex64::new(if i % 2 == 0 { 1.0 } else { -1.0 }, 0.0))
            .collect();
        let samples = code.clone();

        let corr = correlate(&samples, &carrier, &code, &code, &code);
        assert!((corr.prompt.re - n as f64).abs() < 1e-9);
        assert_eq!(corr.prompt, corr.early);
        assert_eq!(corr.prompt, corr.late);
    }

    #[test]
    fn unaligned_window_still_correlates() {
        let n = 32;
        let carrier = vec![Complex64::new(1.0, 0.0); n];
        let code: Vec<Complex64> = (0..n + 3)
            .map(|i| Complex64::new(if i % 2 == 0 { 1.0 } else { -1.0 }, 0.0))
            .collect();
        let samples = &code[3..];
        let corr = correlate(samples, &carrier, &code[0..n], &code[0..n], &code[0..n]);
        // not matched (shifted by 3), so energy should not reach the peak.
        assert!(corr.prompt.re.abs() < n as f64);
    }

    #[test]
    fn zero_signal_yields_zero_correlation() {
        let n = 16;
        let zeros = vec![Complex64::default(); n];
        let carrier = vec![Complex64::new(1.0, 0.0); n];
        let corr = correlate(&zeros, &carrier, &zeros, &zeros, &zeros);
        assert_eq!(corr.early, Complex64::default());
        assert_eq!(corr.prompt, Complex64::default());
        assert_eq!(corr.late, Complex64::default());
    }
}
