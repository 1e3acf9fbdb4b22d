//! Purge core: pure domain model and controller state machine.
mod cursor;
mod effect;
mod eligibility;
mod msg;
mod outcome;
mod partition;
mod rate_limit;
mod session;
mod state;
mod update;
mod view_model;

pub use cursor::{decode_cursor, encode_cursor, CursorError};
pub use effect::Effect;
pub use eligibility::{
    is_protected, parse_timestamp, AgeRule, Candidate, EligibilityFilter, ItemHandle, MarkerRule,
    ProtectionRule, Verdict,
};
pub use msg::Msg;
pub use outcome::{DeletionOutcome, FailReason, SkipReason};
pub use partition::{Partition, PartitionPlan, PlanError, UnknownPartition};
pub use rate_limit::{RateLimitPolicy, RateLimitState, Signal};
pub use session::{Phase, Session};
pub use state::RunState;
pub use update::update;
pub use view_model::{ProgressView, RunCounters};
