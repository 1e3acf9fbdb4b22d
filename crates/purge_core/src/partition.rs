use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One sort order over the account's item listing.
///
/// The remote listing never enumerates everything in a single view, so a run
/// cycles through every sort order to reach full coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    New,
    Hot,
    Top,
    Controversial,
}

impl Partition {
    pub const ALL: [Partition; 4] = [
        Partition::New,
        Partition::Hot,
        Partition::Top,
        Partition::Controversial,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Partition::New => "new",
            Partition::Hot => "hot",
            Partition::Top => "top",
            Partition::Controversial => "controversial",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown partition {0:?}")]
pub struct UnknownPartition(pub String);

impl FromStr for Partition {
    type Err = UnknownPartition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Partition::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPartition(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("partition plan is empty")]
    Empty,
    #[error("partition {0} appears more than once")]
    Duplicate(Partition),
}

/// The fixed, ordered set of partitions a run visits.
///
/// Order defines resume semantics: everything before the persisted index is
/// considered done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    order: Vec<Partition>,
}

impl PartitionPlan {
    pub fn new(order: Vec<Partition>) -> Result<Self, PlanError> {
        if order.is_empty() {
            return Err(PlanError::Empty);
        }
        for (idx, partition) in order.iter().enumerate() {
            if order[..idx].contains(partition) {
                return Err(PlanError::Duplicate(*partition));
            }
        }
        Ok(Self { order })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Partition> {
        self.order.get(index).copied()
    }

    pub fn index_of(&self, partition: Partition) -> Option<usize> {
        self.order.iter().position(|p| *p == partition)
    }

    pub fn iter(&self) -> impl Iterator<Item = Partition> + '_ {
        self.order.iter().copied()
    }
}

impl Default for PartitionPlan {
    fn default() -> Self {
        Self {
            order: Partition::ALL.to_vec(),
        }
    }
}
