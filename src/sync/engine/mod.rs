//! Synchronization decision core.
//!
//! Pure state transitions of one replicated model:
//! - **Input**: locally submitted commands and the server's answer to a round.
//! - **Output**: the merged snapshot and log, plus the callbacks and change
//!   notifications the runtime has to deliver.
//!
//! Nothing in here performs I/O, awaits, or locks.

pub mod delta;
mod logic;
pub mod mapper;
pub mod state;
pub mod sync_log;
pub mod types;


pub use delta::{ChangeNotification, EventDelta};
pub use mapper::{EventMapper, EventMapping, OrderedEventMapper, UnorderedEventMapper};
pub use state::SynchronizedModel;
pub use sync_log::{CommandCallback, LocalChange, SyncLog, SyncLogEntry, SyncLogError};
pub use types::{RoundError, RoundOutcome, RoundRequest, SyncOutcome, SyncReport};

use crate::model::command::CommandResult;
use crate::model::event::XEvent;

impl SynchronizedModel {
    /// Snapshot of the pending queue to send in the next round.
    pub fn start_round(&self) -> RoundRequest {
        logic::start_round(self)
    }

    /// Atomic section of a round: merges the server's answer into the replica.
    pub fn continue_sync(
        &mut self,
        batch_len: usize,
        results: &[CommandResult],
        events: &[XEvent],
        mapper: &dyn EventMapper,
        on_result: &mut dyn FnMut(&XEvent, SyncOutcome),
    ) -> Result<RoundOutcome, RoundError> {
        logic::continue_sync(self, batch_len, results, events, mapper, on_result)
    }
}
