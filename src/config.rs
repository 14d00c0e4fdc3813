//! Per-channel configuration (A2), modeled on the constructor argument
//! lists threaded through `receiver.rs`/`main.rs` and the
//! `structopt`-driven CLI options there.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};

/// Selects between the two tracking variants described in the source
/// material: regenerating the code replica every epoch (accurate, and
/// the only option that honors code Doppler), or reusing a single
/// pre-sampled replica for the life of the channel (faster, and the
/// default "optimized" behavior -- code Doppler is left uncompensated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaPolicy {
    Regenerate,
    PreSampled,
}

impl Default for ReplicaPolicy {
    fn default() -> Self {
        ReplicaPolicy::PreSampled
    }
}

/// Immutable-after-construction per-channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub if_freq_hz: f64,
    pub fs_in_hz: f64,
    pub pll_bw_hz: f64,
    pub dll_bw_hz: f64,
    pub early_late_spc_chips: f64,
    pub vector_length: usize,
    pub replica_policy: ReplicaPolicy,
    pub dump: bool,
    pub dump_filename: String,
    /// TCP-connector variant only; `None` uses the in-process filters.
    pub port: Option<u16>,
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fs_in_hz <= 0.0 {
            return Err(TrackingError::ConfigInvalid(format!(
                "fs_in_hz must be positive, got {}",
                self.fs_in_hz
            )));
        }
        if self.early_late_spc_chips <= 0.0 {
            return Err(TrackingError::ConfigInvalid(format!(
                "early_late_spc_chips must be positive, got {}",
                self.early_late_spc_chips
            )));
        }
        if self.pll_bw_hz <= 0.0 || self.dll_bw_hz <= 0.0 {
            return Err(TrackingError::ConfigInvalid(
                "loop bandwidths must be positive".to_string(),
            ));
        }
        if self.vector_length == 0 {
            return Err(TrackingError::ConfigInvalid(
                "vector_length must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            if_freq_hz: 0.0,
            fs_in_hz: 4_000_000.0,
            pll_bw_hz: 25.0,
            dll_bw_hz: 2.0,
            early_late_spc_chips: 0.5,
            vector_length: 4092,
            replica_policy: ReplicaPolicy::PreSampled,
            dump: false,
            dump_filename: "track_ch".to_string(),
            port: None,
        }
    }
}

/// Validate a PRN is in the supported GPS range; kept here rather than
/// in `prn.rs` since it belongs to the construction-time config check
/// rather than the (pure, total) code generator.
pub fn validate_prn(prn: u8) -> Result<()> {
    if !(1..=32).contains(&prn) {
        return Err(TrackingError::ConfigInvalid(format!(
            "unsupported PRN {prn}, expected 1..=32"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ChannelConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_nonpositive_sample_rate() {
        let mut cfg = ChannelConfig::default();
        cfg.fs_in_hz = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_nonpositive_spacing() {
        let mut cfg = ChannelConfig::default();
        cfg.early_late_spc_chips = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unsupported_prn() {
        assert!(validate_prn(0).is_err());
        assert!(validate_prn(33).is_err());
        assert!(validate_prn(1).is_ok());
        assert!(validate_prn(32).is_ok());
    }
}
