//! Multi-channel runner (A6): owns one `TrackingChannel` per satellite
//! slot and drives them in parallel, one `general_work` call per
//! channel per epoch tick. Modeled on `Receiver::process_step`, which
//! fans out over `HashMap<SV, Channel>` via `rayon::par_iter_mut`;
//! generalized here to a fixed channel table since PRN assignment is
//! an acquisition concern out of scope for this core.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::channel::{AcquisitionHandoff, TrackingChannel};
use crate::config::ChannelConfig;
use crate::control::{control_queue, ControlEvent};
use crate::error::Result;
use crate::measurement::Measurement;

/// Owns a fixed set of tracking channels and the control queue they
/// all post loss-of-lock events to.
pub struct MultiChannelReceiver {
    channels: HashMap<u32, TrackingChannel>,
    control_rx: Receiver<ControlEvent>,
}

impl MultiChannelReceiver {
    /// Build `num_channels` idle channels sharing one bounded control
    /// queue, all with the same starting configuration.
    pub fn new(num_channels: u32, config: ChannelConfig) -> Result<Self> {
        let (control_tx, control_rx) = control_queue(num_channels.max(1) as usize * 4);
        let mut channels = HashMap::with_capacity(num_channels as usize);
        for id in 0..num_channels {
            channels.insert(id, TrackingChannel::new(id, config.clone(), control_tx.clone())?);
        }
        Ok(Self {
            channels,
            control_rx,
        })
    }

    pub fn assign(&mut self, channel_id: u32, handoff: AcquisitionHandoff) -> Result<()> {
        if let Some(ch) = self.channels.get_mut(&channel_id) {
            ch.start_tracking(handoff)?;
        }
        Ok(())
    }

    pub fn stop(&mut self, channel_id: u32) {
        if let Some(ch) = self.channels.get_mut(&channel_id) {
            ch.stop();
        }
    }

    /// Drive every channel through one epoch against the same sample
    /// block, in parallel. Channels with different epoch lengths each
    /// report how much of the block they actually consumed; the caller
    /// (owning the sample source) is responsible for giving each
    /// channel a view long enough for its longest plausible epoch.
    pub fn process_step(&mut self, samples: &[Complex64]) -> Vec<(u32, Measurement, usize)> {
        self.channels
            .par_iter_mut()
            .map(|(&id, channel)| {
                let (measurement, consumed) = channel.general_work(samples);
                (id, measurement, consumed)
            })
            .collect()
    }

    /// Drain any loss-of-lock (or future) events posted since the last call.
    pub fn drain_control_events(&self) -> Vec<ControlEvent> {
        self.control_rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChannelConfig {
        ChannelConfig {
            if_freq_hz: 0.0,
            fs_in_hz: 4_000_000.0,
            pll_bw_hz: 25.0,
            dll_bw_hz: 2.0,
            early_late_spc_chips: 0.5,
            vector_length: 4092,
            replica_policy: crate::config::ReplicaPolicy::Regenerate,
            dump: false,
            dump_filename: String::new(),
            port: None,
        }
    }

    #[test]
    fn idle_channels_each_emit_one_measurement_per_step() {
        let mut rcv = MultiChannelReceiver::new(4, test_config()).unwrap();
        let samples = vec![Complex64::default(); 4092];
        let results = rcv.process_step(&samples);
        assert_eq!(results.len(), 4);
        for (_, _measurement, consumed) in &results {
            assert_eq!(*consumed, 4092);
        }
    }

    #[test]
    fn assign_moves_target_channel_into_pull_in() {
        let mut rcv = MultiChannelReceiver::new(2, test_config()).unwrap();
        rcv.assign(
            0,
            AcquisitionHandoff {
                prn: 1,
                acq_code_phase_samples: 0.0,
                acq_doppler_hz: 0.0,
                acq_sample_stamp: 0,
                system_tag: b'G',
            },
        )
        .unwrap();
        assert_eq!(
            rcv.channels.get(&0).unwrap().phase(),
            crate::channel::Phase::PullIn
        );
        assert_eq!(
            rcv.channels.get(&1).unwrap().phase(),
            crate::channel::Phase::Idle
        );
    }
}
