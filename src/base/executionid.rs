//! Execution identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique, monotonically increasing identifier of one request execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(u64);

impl ExecutionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Source of execution identifiers.
///
/// The process-wide instance is [`EXECUTION_IDS`]. It starts at zero when the
/// process starts, every call to [`next`](Self::next) is a single atomic
/// increment (so the first id handed out is 1), and it is never reset.
#[derive(Debug)]
pub struct ExecutionIdGenerator {
    counter: AtomicU64,
}

impl ExecutionIdGenerator {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> ExecutionId {
        ExecutionId(self.counter.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl Default for ExecutionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// The only state shared across executions.
pub static EXECUTION_IDS: ExecutionIdGenerator = ExecutionIdGenerator::new();
