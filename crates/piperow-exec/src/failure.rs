//! Set-once failure slot shared by the feeder and the consumer.

use std::sync::{Mutex, PoisonError};

use crate::error::PipelineError;

enum Slot {
    Empty,
    Set(PipelineError),
    Reported,
}

/// Holds the first failure of a pipeline run until the consumer picks it up.
///
/// The first call to [`record`](Self::record) wins; later failures are
/// returned to the caller so they can be logged and dropped. [`take`](Self::take)
/// hands the failure out once, after which the slot stays closed.
pub struct PipelineFailure {
    slot: Mutex<Slot>,
}

impl Default for PipelineFailure {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineFailure {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
        }
    }

    /// Store `err` if nothing was recorded yet. Otherwise give it back.
    pub fn record(&self, err: PipelineError) -> Result<(), PipelineError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            Slot::Empty => {
                *slot = Slot::Set(err);
                Ok(())
            }
            Slot::Set(_) | Slot::Reported => Err(err),
        }
    }

    /// Whether a failure has ever been recorded.
    pub fn is_set(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        !matches!(*slot, Slot::Empty)
    }

    /// Hand out the recorded failure. Returns `None` on every later call.
    pub fn take(&self) -> Option<PipelineError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *slot, Slot::Reported) {
            Slot::Set(err) => Some(err),
            Slot::Empty => {
                *slot = Slot::Empty;
                None
            }
            Slot::Reported => None,
        }
    }
}
