use crate::{Partition, RunState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PersistCursor(RunState),
    ClearCursor,
    NavigateTo(Partition),
    ProcessPartition(Partition),
    PartitionDone(Partition),
    RunComplete,
    Halted,
}
