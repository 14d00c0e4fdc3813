//! Error taxonomy. `recording.rs`/`network.rs` lean on ad hoc
//! `Box<dyn Error>`; the defined set of error kinds here is expressed
//! as a proper enum instead, following the `thiserror` convention used
//! elsewhere in the pack (chimera-core, baudacious, regatta-backend).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    /// Non-positive sample rate, non-positive EPL spacing, or an
    /// out-of-range PRN. Fatal at construction.
    #[error("invalid channel configuration: {0}")]
    ConfigInvalid(String),

    /// `acq_sample_stamp` is ahead of the channel's own `sample_counter`
    /// at `start_tracking`. Tracking rejects the hand-off and stays Idle.
    #[error("acquisition hand-off is stale: acq_sample_stamp={acq_sample_stamp} > sample_counter={sample_counter}")]
    AcquisitionStale {
        acq_sample_stamp: u64,
        sample_counter: u64,
    },

    /// Aligned-buffer allocation failed at construction, or a remote
    /// filter backend failed to provision its working buffers.
    #[error("failed to allocate tracking buffers: {0}")]
    AllocationFailed(String),

    /// Non-fatal: dump-file I/O failed and was suppressed.
    #[error("dump file I/O error: {0}")]
    DumpIoError(#[from] std::io::Error),

    /// The control-message queue rejected a loss-of-lock event after one retry.
    #[error("control queue full, event dropped for channel {channel_id}")]
    ControlQueueFull { channel_id: u32 },
}

pub type Result<T> = std::result::Result<T, TrackingError>;
