//! Control-message queue (A5): multiple-producer, single-consumer
//! channel carrying loss-of-lock (and future) events out of the
//! tracking core, modeled on `std::sync::mpsc` rather than the
//! teacher's ad hoc `Arc<Mutex<VecDeque<..>>>` (`network.rs`) -- mpsc
//! already gives MPSC semantics and a bounded variant for free.

use std::sync::mpsc::{Receiver, SyncSender, TrySendError};

use crate::constants::EVENT_LOSS_OF_LOCK;
use crate::error::TrackingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    pub channel_id: u32,
    pub event_code: u32,
}

impl ControlEvent {
    pub fn loss_of_lock(channel_id: u32) -> Self {
        Self {
            channel_id,
            event_code: EVENT_LOSS_OF_LOCK,
        }
    }
}

/// Producer handle held by each tracking channel.
#[derive(Clone)]
pub struct ControlSender {
    tx: SyncSender<ControlEvent>,
}

impl ControlSender {
    /// Post an event, retrying once on a full queue; drop and return
    /// `ControlQueueFull` if the retry also fails. Never blocks.
    pub fn post(&self, event: ControlEvent) -> Result<(), TrackingError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => match self.tx.try_send(event) {
                Ok(()) => Ok(()),
                Err(_) => {
                    log::warn!(
                        "control queue full, dropping loss-of-lock event for channel {}",
                        event.channel_id
                    );
                    Err(TrackingError::ControlQueueFull {
                        channel_id: event.channel_id,
                    })
                }
            },
            Err(TrySendError::Disconnected(_)) => Err(TrackingError::ControlQueueFull {
                channel_id: event.channel_id,
            }),
        }
    }
}

/// Create a bounded control queue; `capacity` is the number of
/// in-flight events the consumer may lag behind by before events start
/// getting dropped.
pub fn control_queue(capacity: usize) -> (ControlSender, Receiver<ControlEvent>) {
    let (tx, rx) = std::sync::mpsc::sync_channel(capacity);
    (ControlSender { tx }, rx)
}
