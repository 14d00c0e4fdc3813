//! Measurement Emitter (C8): the per-epoch output record handed to the
//! (out of scope) telemetry decoder / observables stage. `repr(C)` so
//! it has a fixed, C-compatible layout for transport over an
//! in-process queue.

/// One measurement per `general_work` invocation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub prn: u8,
    pub system_tag: u8,
    pub channel_id: u32,
    pub prompt_i: f64,
    pub prompt_q: f64,
    pub tracking_timestamp_secs: f64,
    pub code_phase_secs: f64,
    pub carrier_phase_rads: f64,
    pub carrier_doppler_hz: f64,
    pub cn0_db_hz: f64,
}

impl Measurement {
    /// A null/echo measurement emitted while a channel is Idle: it
    /// copies the (possibly stale) acquisition hand-off so downstream
    /// consumers see a consistent shape even before tracking starts.
    pub fn idle(channel_id: u32, prn: u8, system_tag: u8) -> Self {
        Self {
            prn,
            system_tag,
            channel_id,
            prompt_i: 0.0,
            prompt_q: 0.0,
            tracking_timestamp_secs: 0.0,
            code_phase_secs: 0.0,
            carrier_phase_rads: 0.0,
            carrier_doppler_hz: 0.0,
            cn0_db_hz: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_measurement_is_zeroed_but_tagged() {
        let m = Measurement::idle(2, 7, b'G');
        assert_eq!(m.channel_id, 2);
        assert_eq!(m.prn, 7);
        assert_eq!(m.system_tag, b'G');
        assert_eq!(m.cn0_db_hz, 0.0);
    }

    #[test]
    fn record_has_fixed_layout() {
        // repr(C) guarantees a stable size across builds of the same
        // target; this pins it so an accidental field reorder/resize
        // that breaks the dump-file format fails loudly.
        assert_eq!(std::mem::size_of::<Measurement>(), 8 * 7 + 4 + 4);
    }
}
