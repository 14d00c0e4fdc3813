//! Tracking Channel State Machine (C7): the per-satellite driver that
//! wires the PRN generator, NCO, correlator, discriminators, loop
//! filters and lock estimator into the acquisition-to-tracking
//! handoff and the steady-state epoch loop.
//!
//! Modeled on `Tracking`/`Channel`: the `TrackState` enum,
//! `acquisition_process`/`tracking_process` split, and
//! `run_fll`/`run_pll`/`run_dll` update sequencing all map onto
//! `Phase`/`start_tracking`/`general_work` here, generalized to the
//! pull-in alignment and carrier-aiding formulas from
//! `gps_l1_ca_dll_pll_optim_tracking_cc.cc`'s `start_tracking` /
//! `general_work`.

use colored::Colorize;
use num_complex::Complex64;

use crate::config::{validate_prn, ChannelConfig, ReplicaPolicy};
use crate::constants::{
    CA_CODE_LENGTH_CHIPS, CA_CODE_PERIOD_S, CA_CODE_RATE_CHIPS_PER_S, CARRIER_LOCK_THRESHOLD,
    L1_FREQ_HZ, MAX_LOCK_FAIL, MIN_VALID_CN0_DB_HZ, TWO_PI,
};
use crate::control::{ControlEvent, ControlSender};
use crate::correlator::{self, EplCorrelation};
use crate::discriminator::{dll_nc_e_minus_l_normalized, pll_cloop_two_quadrant_atan};
use crate::dump::{DumpRecord, DumpWriter};
use crate::error::{Result, TrackingError};
use crate::lock::{self, PromptRing};
use crate::loop_filter::{LoopFilterBackend, SecondOrderLoopFilter};
use crate::measurement::Measurement;
use crate::nco::generate_carrier_replica;
use crate::prn::GuardedCaCode;

/// Read-once acquisition snapshot handed to `start_tracking`.
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionHandoff {
    pub prn: u8,
    pub acq_code_phase_samples: f64,
    pub acq_doppler_hz: f64,
    pub acq_sample_stamp: u64,
    pub system_tag: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PullIn,
    Tracking,
    Lost,
}

/// `fmod` with C semantics (result takes the sign of `x`), used for the
/// carrier-phase wrap; `f64::rem_euclid` would instead always return a
/// non-negative result.
fn fmod(x: f64, m: f64) -> f64 {
    x - (x / m).trunc() * m
}

pub struct TrackingChannel {
    channel_id: u32,
    config: ChannelConfig,
    control: ControlSender,
    dump: Option<DumpWriter>,

    phase: Phase,
    stop_requested: bool,
    handoff: Option<AcquisitionHandoff>,
    code: Option<GuardedCaCode>,

    sample_counter: u64,
    carrier_doppler_hz: f64,
    code_freq_chips_per_s: f64,
    rem_code_phase_samples: f64,
    rem_carr_phase_rad: f64,
    acc_carrier_phase_rad: f64,
    acc_code_phase_secs: f64,
    current_prn_length_samples: usize,

    prompt_ring: PromptRing,
    cn0_db_hz: f64,
    carrier_lock_test: f64,
    lock_fail_counter: u32,

    pll: SecondOrderLoopFilter,
    dll: SecondOrderLoopFilter,

    /// Pre-sampled replicas for `ReplicaPolicy::PreSampled`, built once
    /// on pull-in; `replica_len` is their fixed correlation length.
    early_replica: Vec<Complex64>,
    prompt_replica: Vec<Complex64>,
    late_replica: Vec<Complex64>,
    replica_len: usize,

    carrier_scratch: Vec<Complex64>,
    early_scratch: Vec<Complex64>,
    prompt_scratch: Vec<Complex64>,
    late_scratch: Vec<Complex64>,
}

impl TrackingChannel {
    pub fn new(channel_id: u32, config: ChannelConfig, control: ControlSender) -> Result<Self> {
        config.validate()?;

        let dump = if config.dump {
            match DumpWriter::open(&config.dump_filename, channel_id) {
                Ok(w) => Some(w),
                Err(e) => {
                    log::warn!("channel {channel_id}: failed to open dump file: {e}");
                    None
                }
            }
        } else {
            None
        };

        let vector_length = config.vector_length;
        Ok(Self {
            channel_id,
            config,
            control,
            dump,
            phase: Phase::Idle,
            stop_requested: false,
            handoff: None,
            code: None,
            sample_counter: 0,
            carrier_doppler_hz: 0.0,
            code_freq_chips_per_s: CA_CODE_RATE_CHIPS_PER_S,
            rem_code_phase_samples: 0.0,
            rem_carr_phase_rad: 0.0,
            acc_carrier_phase_rad: 0.0,
            acc_code_phase_secs: 0.0,
            current_prn_length_samples: vector_length,
            prompt_ring: PromptRing::default(),
            cn0_db_hz: 0.0,
            carrier_lock_test: 0.0,
            lock_fail_counter: 0,
            pll: SecondOrderLoopFilter::for_pll(0.0),
            dll: SecondOrderLoopFilter::for_dll(0.0),
            early_replica: Vec::new(),
            prompt_replica: Vec::new(),
            late_replica: Vec::new(),
            replica_len: 0,
            carrier_scratch: Vec::new(),
            early_scratch: Vec::new(),
            prompt_scratch: Vec::new(),
            late_scratch: Vec::new(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// Samples the caller should hand to the next `general_work` call
    /// (the epoch length declared by the previous one, or the
    /// configured nominal length before tracking starts).
    pub fn next_epoch_len_samples(&self) -> usize {
        self.current_prn_length_samples
    }

    /// Request transition to Idle at the next epoch boundary.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    /// Read-once acquisition hand-off. Rejects a stale stamp without
    /// touching channel state.
    pub fn start_tracking(&mut self, handoff: AcquisitionHandoff) -> Result<()> {
        if handoff.acq_sample_stamp > self.sample_counter {
            return Err(TrackingError::AcquisitionStale {
                acq_sample_stamp: handoff.acq_sample_stamp,
                sample_counter: self.sample_counter,
            });
        }
        validate_prn(handoff.prn)?;
        self.code = Some(GuardedCaCode::new(handoff.prn).ok_or_else(|| {
            TrackingError::ConfigInvalid(format!("unsupported PRN {}", handoff.prn))
        })?);
        self.handoff = Some(handoff);
        self.pll = SecondOrderLoopFilter::for_pll(self.config.pll_bw_hz);
        self.dll = SecondOrderLoopFilter::for_dll(self.config.dll_bw_hz);
        self.current_prn_length_samples = self.config.vector_length;
        self.phase = Phase::PullIn;
        Ok(())
    }

    /// Drive the channel one epoch forward. Returns the emitted
    /// measurement and the number of input samples this call consumed
    /// (the caller must advance its own stream position by that much).
    pub fn general_work(&mut self, samples: &[Complex64]) -> (Measurement, usize) {
        if self.stop_requested {
            self.stop_requested = false;
            self.phase = Phase::Idle;
        }

        match self.phase {
            Phase::Idle | Phase::Lost => self.idle_epoch(samples),
            Phase::PullIn => self.pull_in_epoch(),
            Phase::Tracking => self.tracking_epoch(samples),
        }
    }

    fn idle_epoch(&self, samples: &[Complex64]) -> (Measurement, usize) {
        let (prn, system_tag) = self
            .handoff
            .map(|h| (h.prn, h.system_tag))
            .unwrap_or((0, 0));
        (
            Measurement::idle(self.channel_id, prn, system_tag),
            samples.len(),
        )
    }

    fn pull_in_epoch(&mut self) -> (Measurement, usize) {
        let handoff = self.handoff.expect("PullIn requires a prior start_tracking");
        let fs_in = self.config.fs_in_hz;
        let nominal_chip_rate = CA_CODE_RATE_CHIPS_PER_S;

        let acq_to_trk_delay = self.sample_counter.saturating_sub(handoff.acq_sample_stamp) as f64;

        // (b)1-2: alignment shift to the next code-epoch boundary, using
        // the nominal block length configured at construction.
        let initial_len = self.current_prn_length_samples as f64;
        let shift_correction = initial_len - (acq_to_trk_delay % initial_len);

        // (b)3-4
        let samples_offset = (handoff.acq_code_phase_samples + shift_correction).round() as i64;
        let samples_offset = samples_offset.max(0) as u64;
        self.sample_counter += samples_offset;

        // (b)5: Doppler-induced PRN-period recompute and code-phase slip.
        let doppler = handoff.acq_doppler_hz;
        let t_prn_mod = CA_CODE_LENGTH_CHIPS as f64 / (nominal_chip_rate * (1.0 + doppler / L1_FREQ_HZ));
        let t_prn_true = CA_CODE_LENGTH_CHIPS as f64 / nominal_chip_rate;
        let n_prn_diff = (acq_to_trk_delay / fs_in) / t_prn_true;

        let mut acq_code_phase_samples = fmod(
            handoff.acq_code_phase_samples + (t_prn_true - t_prn_mod) * n_prn_diff * fs_in,
            t_prn_true * fs_in,
        );
        if acq_code_phase_samples < 0.0 {
            acq_code_phase_samples += t_prn_mod * fs_in;
        }
        log::debug!(
            "channel {}: pull-in slip-corrected code phase {acq_code_phase_samples:.3} samples",
            self.channel_id
        );

        self.current_prn_length_samples =
            (CA_CODE_PERIOD_S * fs_in * L1_FREQ_HZ / (L1_FREQ_HZ + doppler)).round() as usize;

        // (b)6
        self.pll.initialize();
        self.dll.initialize();
        self.rem_code_phase_samples = 0.0;
        self.rem_carr_phase_rad = 0.0;
        self.acc_carrier_phase_rad = 0.0;
        self.carrier_doppler_hz = doppler;
        self.code_freq_chips_per_s =
            nominal_chip_rate + self.carrier_doppler_hz * nominal_chip_rate / L1_FREQ_HZ;
        self.lock_fail_counter = 0;
        self.prompt_ring = PromptRing::default();
        self.cn0_db_hz = 0.0;
        self.carrier_lock_test = 0.0;

        // (b)7: pre-sample E/P/L once at the nominal code rate.
        self.presample_replicas();

        // (b)8
        self.phase = Phase::Tracking;
        log::info!(
            "{}",
            format!(
                "channel {}: PRN{} pull-in complete, doppler={:.1} Hz",
                self.channel_id, handoff.prn, doppler
            )
            .green()
        );
        let m = Measurement {
            prn: handoff.prn,
            system_tag: handoff.system_tag,
            channel_id: self.channel_id,
            prompt_i: 0.0,
            prompt_q: 0.0,
            tracking_timestamp_secs: (self.sample_counter as f64
                + self.current_prn_length_samples as f64
                + self.rem_code_phase_samples)
                / fs_in,
            code_phase_secs: 0.0,
            carrier_phase_rads: self.acc_carrier_phase_rad,
            carrier_doppler_hz: self.carrier_doppler_hz,
            cn0_db_hz: self.cn0_db_hz,
        };
        (m, samples_offset as usize)
    }

    fn early_late_spc_samples(&self) -> usize {
        let code_step = self.code_freq_chips_per_s / self.config.fs_in_hz;
        (self.config.early_late_spc_chips / code_step).round().max(1.0) as usize
    }

    fn presample_replicas(&mut self) {
        let spc = self.early_late_spc_samples();
        let n = self.current_prn_length_samples;
        self.replica_len = n;
        let code_step = self.code_freq_chips_per_s / self.config.fs_in_hz;
        let code = self.code.as_ref().expect("code must be set before pull-in");

        let total = n + 2 * spc;
        let mut buf = Vec::with_capacity(total);
        for k in 0..total {
            buf.push(code.chip_at(k as f64 * code_step - self.config.early_late_spc_chips));
        }
        self.early_replica = buf[0..n].to_vec();
        self.prompt_replica = buf[spc..spc + n].to_vec();
        self.late_replica = buf[2 * spc..2 * spc + n].to_vec();
    }

    fn regenerate_replicas(&mut self, n: usize) {
        let spc_chips = self.config.early_late_spc_chips;
        let code_step = self.code_freq_chips_per_s / self.config.fs_in_hz;
        let rem_code_phase_chips = self.rem_code_phase_samples * code_step;
        let tcode_start = -rem_code_phase_chips;
        let code = self.code.as_ref().expect("code must be set before tracking");

        self.early_scratch.clear();
        self.prompt_scratch.clear();
        self.late_scratch.clear();
        self.early_scratch.reserve(n);
        self.prompt_scratch.reserve(n);
        self.late_scratch.reserve(n);

        for i in 0..n {
            let tcode = tcode_start + i as f64 * code_step;
            self.early_scratch.push(code.chip_at(tcode - spc_chips));
            self.prompt_scratch.push(code.chip_at(tcode));
            self.late_scratch.push(code.chip_at(tcode + spc_chips));
        }
    }

    fn tracking_epoch(&mut self, samples: &[Complex64]) -> (Measurement, usize) {
        let fs_in = self.config.fs_in_hz;
        let nominal_chip_rate = CA_CODE_RATE_CHIPS_PER_S;
        let t_code = CA_CODE_PERIOD_S;

        let n = match self.config.replica_policy {
            ReplicaPolicy::PreSampled => self.replica_len,
            ReplicaPolicy::Regenerate => self.current_prn_length_samples,
        };
        let n = n.min(samples.len());
        let window = &samples[0..n];

        // (c)1: carrier replica.
        self.carrier_scratch.resize(n, Complex64::default());
        let phase_step = TWO_PI * self.carrier_doppler_hz / fs_in;
        generate_carrier_replica(&mut self.carrier_scratch, self.rem_carr_phase_rad, phase_step);

        // (c)2: code replicas.
        let corr: EplCorrelation = match self.config.replica_policy {
            ReplicaPolicy::PreSampled => correlator::correlate(
                window,
                &self.carrier_scratch,
                &self.early_replica[..n],
                &self.prompt_replica[..n],
                &self.late_replica[..n],
            ),
            ReplicaPolicy::Regenerate => {
                self.regenerate_replicas(n);
                correlator::correlate(
                    window,
                    &self.carrier_scratch,
                    &self.early_scratch,
                    &self.prompt_scratch,
                    &self.late_scratch,
                )
            }
        };

        // (c)4: PLL update.
        let carr_err_cycles = pll_cloop_two_quadrant_atan(corr.prompt) / TWO_PI;
        let carr_correction_hz = self.pll.update(carr_err_cycles);
        let acq_doppler_hz = self.handoff.map(|h| h.acq_doppler_hz).unwrap_or(0.0);
        self.carrier_doppler_hz = acq_doppler_hz + carr_correction_hz;
        self.code_freq_chips_per_s =
            nominal_chip_rate + self.carrier_doppler_hz * nominal_chip_rate / L1_FREQ_HZ;
        self.acc_carrier_phase_rad += TWO_PI * self.carrier_doppler_hz * t_code;
        self.rem_carr_phase_rad = fmod(
            self.rem_carr_phase_rad + TWO_PI * self.carrier_doppler_hz * t_code,
            TWO_PI,
        );

        // (c)5: DLL update.
        let code_err_chips = dll_nc_e_minus_l_normalized(corr.early, corr.late);
        let code_rate_correction_chips_per_s = self.dll.update(code_err_chips);
        let code_err_secs = t_code * code_rate_correction_chips_per_s / nominal_chip_rate;
        self.acc_code_phase_secs += code_err_secs;

        // (c)6: epoch-length update.
        let t_prn_samples = fs_in / self.code_freq_chips_per_s * CA_CODE_LENGTH_CHIPS as f64;
        let k_blk = t_prn_samples + self.rem_code_phase_samples + code_err_secs * fs_in;
        self.current_prn_length_samples = k_blk.round() as usize;
        self.rem_code_phase_samples = k_blk - self.current_prn_length_samples as f64;

        // (c)7: ring + lock estimator.
        if self.prompt_ring.push(corr.prompt) {
            let estimate = lock::estimate(self.prompt_ring.samples(), fs_in);
            self.cn0_db_hz = estimate.cn0_db_hz;
            self.carrier_lock_test = estimate.carrier_lock_test;
            self.update_lock_fail_counter();
        }

        // (c)8: emit measurement, consuming exactly the epoch's input samples.
        let (prn, system_tag) = self
            .handoff
            .map(|h| (h.prn, h.system_tag))
            .unwrap_or((0, 0));
        let measurement = Measurement {
            prn,
            system_tag,
            channel_id: self.channel_id,
            prompt_i: corr.prompt.re,
            prompt_q: corr.prompt.im,
            tracking_timestamp_secs: (self.sample_counter as f64
                + self.current_prn_length_samples as f64
                + self.rem_code_phase_samples)
                / fs_in,
            code_phase_secs: 0.0,
            carrier_phase_rads: self.acc_carrier_phase_rad,
            carrier_doppler_hz: self.carrier_doppler_hz,
            cn0_db_hz: self.cn0_db_hz,
        };

        self.write_dump(
            &corr,
            carr_err_cycles,
            carr_correction_hz,
            code_err_chips,
            code_rate_correction_chips_per_s,
        );
        self.sample_counter += n as u64;
        (measurement, n)
    }

    fn update_lock_fail_counter(&mut self) {
        let out_of_threshold =
            self.carrier_lock_test < CARRIER_LOCK_THRESHOLD || self.cn0_db_hz < MIN_VALID_CN0_DB_HZ;
        if out_of_threshold {
            self.lock_fail_counter += 1;
        } else {
            self.lock_fail_counter = self.lock_fail_counter.saturating_sub(1);
        }

        if self.lock_fail_counter > MAX_LOCK_FAIL {
            self.phase = Phase::Lost;
            self.lock_fail_counter = 0;
            log::warn!(
                "{}",
                format!("channel {}: lost lock (CN0={:.1} dB-Hz)", self.channel_id, self.cn0_db_hz)
                    .red()
            );
            if let Err(e) = self.control.post(ControlEvent::loss_of_lock(self.channel_id)) {
                log::warn!("channel {}: {e}", self.channel_id);
            }
        }
    }

    fn write_dump(
        &mut self,
        corr: &EplCorrelation,
        carr_err_raw: f64,
        carr_err_filt: f64,
        code_err_raw: f64,
        code_err_filt: f64,
    ) {
        let Some(dump) = self.dump.as_mut() else {
            return;
        };
        let record = DumpRecord {
            early_mag: corr.early.norm() as f32,
            prompt_mag: corr.prompt.norm() as f32,
            late_mag: corr.late.norm() as f32,
            prompt_i: corr.prompt.re as f32,
            prompt_q: corr.prompt.im as f32,
            sample_counter: self.sample_counter,
            acc_carrier_phase_rad: self.acc_carrier_phase_rad as f32,
            carrier_doppler_hz: self.carrier_doppler_hz as f32,
            code_freq_chips: self.code_freq_chips_per_s as f32,
            carr_err_raw: carr_err_raw as f32,
            carr_err_filt: carr_err_filt as f32,
            code_err_raw: code_err_raw as f32,
            code_err_filt: code_err_filt as f32,
            cn0_db_hz: self.cn0_db_hz as f32,
            carrier_lock_test: self.carrier_lock_test as f32,
            rem_code_phase_samples: self.rem_code_phase_samples as f32,
            next_sample_counter: self.sample_counter as f64 + self.current_prn_length_samples as f64,
        };
        if let Err(e) = dump.write_record(&record) {
            log::warn!("channel {}: dump write failed: {e}", self.channel_id);
        }
    }
}
