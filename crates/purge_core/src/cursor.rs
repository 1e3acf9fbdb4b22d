//! Text codec for the persisted resume cursor.
//!
//! The cursor is a handful of `key=value` lines:
//!
//! ```text
//! running=1
//! partition=top
//! preserve_window_ms=864000000
//! ```
//!
//! `partition` names the partition the run is positioned at, or `done` once
//! every partition has been completed. Completed partitions are never stored;
//! they are everything ordered before `partition` in the plan.

use std::time::Duration;

use thiserror::Error;

use crate::{PartitionPlan, RunState};

const KEY_RUNNING: &str = "running";
const KEY_PARTITION: &str = "partition";
const KEY_PRESERVE: &str = "preserve_window_ms";
const PARTITION_DONE: &str = "done";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("cursor is missing required key {0:?}")]
    MissingKey(&'static str),
    #[error("cursor line {0:?} is not a key=value pair")]
    MalformedLine(String),
    #[error("cursor key {key:?} has invalid value {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("cursor partition {0:?} is not part of the current plan")]
    PartitionNotInPlan(String),
}

pub fn encode_cursor(state: &RunState, plan: &PartitionPlan) -> String {
    let partition = state
        .current_partition(plan)
        .map(|p| p.as_str())
        .unwrap_or(PARTITION_DONE);
    let running = if state.running { "1" } else { "0" };
    format!(
        "{KEY_RUNNING}={running}\n{KEY_PARTITION}={partition}\n{KEY_PRESERVE}={}\n",
        state.preserve_window.as_millis()
    )
}

pub fn decode_cursor(text: &str, plan: &PartitionPlan) -> Result<RunState, CursorError> {
    let mut running = None;
    let mut partition = None;
    let mut preserve = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| CursorError::MalformedLine(line.to_string()))?;
        let value = value.trim();
        match key.trim() {
            KEY_RUNNING => running = Some(parse_flag(value)?),
            KEY_PARTITION => partition = Some(value.to_string()),
            KEY_PRESERVE => {
                let ms = value.parse::<u64>().map_err(|_| CursorError::InvalidValue {
                    key: KEY_PRESERVE,
                    value: value.to_string(),
                })?;
                preserve = Some(Duration::from_millis(ms));
            }
            // Unknown keys are tolerated so older binaries can read newer cursors.
            _ => {}
        }
    }

    let running = running.ok_or(CursorError::MissingKey(KEY_RUNNING))?;
    let partition = partition.ok_or(CursorError::MissingKey(KEY_PARTITION))?;
    let preserve = preserve.ok_or(CursorError::MissingKey(KEY_PRESERVE))?;

    let index = if partition == PARTITION_DONE {
        plan.len()
    } else {
        let parsed = partition
            .parse()
            .map_err(|_| CursorError::InvalidValue {
                key: KEY_PARTITION,
                value: partition.clone(),
            })?;
        plan.index_of(parsed)
            .ok_or(CursorError::PartitionNotInPlan(partition))?
    };

    let mut state = RunState::resume(plan, index, preserve);
    state.running = running;
    Ok(state)
}

fn parse_flag(value: &str) -> Result<bool, CursorError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(CursorError::InvalidValue {
            key: KEY_RUNNING,
            value: other.to_string(),
        }),
    }
}
