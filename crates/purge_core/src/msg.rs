use std::time::Duration;

use crate::RunState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Operator asked for a fresh run with the given preserve window.
    StartRequested { preserve_window: Duration },
    /// A running cursor was found in persistence (startup or after a reload).
    Resume(RunState),
    /// The content source is now showing the partition being entered.
    Positioned,
    /// The current partition yielded nothing more to process.
    PartitionExhausted,
    /// Operator asked the run to stop.
    StopRequested,
}
