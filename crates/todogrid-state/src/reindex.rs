//! Row Reindexer — restores dense serial numbers after deletions.
//!
//! A pass re-stamps every row's `serialNo` to its 1-based rank in creation
//! order. Each row is written in its own transaction; a row that fails is
//! recorded in the [`DeadLetterLog`] and the pass moves on. A pass never
//! returns an error to its caller.
//!
//! Passes are not queued. Two concurrent deletions may run two passes; both
//! compute the same ranking from the rows they see, so the result
//! converges.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::StateResult;
use crate::store::{StateStore, epoch_millis};
use crate::types::Row;

/// Default number of failures retained by the dead-letter log.
pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 256;

/// A row the reindexer could not re-stamp.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReindexFailure {
    /// Row id, or `None` when the row snapshot itself could not be read.
    pub row_id: Option<String>,
    /// Serial number the row should have received.
    pub serial_no: Option<u64>,
    pub error: String,
    /// Unix timestamp (milliseconds) of the failure.
    pub at: u64,
}

/// Bounded in-memory record of reindex failures. Oldest entries are
/// evicted first.
#[derive(Debug, Clone)]
pub struct DeadLetterLog {
    entries: Arc<Mutex<VecDeque<ReindexFailure>>>,
    capacity: usize,
}

impl Default for DeadLetterLog {
    fn default() -> Self {
        Self::new(DEFAULT_DEAD_LETTER_CAPACITY)
    }
}

impl DeadLetterLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, failure: ReindexFailure) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if self.capacity == 0 {
            return;
        }
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(failure);
    }

    /// Copy of the retained failures, oldest first.
    pub fn snapshot(&self) -> Vec<ReindexFailure> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Summary of one reindex pass.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ReindexReport {
    /// Rows seen in the snapshot.
    pub total: usize,
    /// Rows whose serial number was rewritten.
    pub restamped: usize,
    /// Rows that could not be rewritten.
    pub failed: usize,
}

/// Row access a reindex pass needs.
pub trait RowSource {
    /// Snapshot of all rows in creation order.
    fn rows_in_creation_order(&self) -> StateResult<Vec<Row>>;

    /// Set one row's serial number; `Ok(false)` if the row is gone.
    fn restamp_serial(&self, id: &str, serial_no: u64) -> StateResult<bool>;
}

impl RowSource for StateStore {
    fn rows_in_creation_order(&self) -> StateResult<Vec<Row>> {
        StateStore::rows_in_creation_order(self)
    }

    fn restamp_serial(&self, id: &str, serial_no: u64) -> StateResult<bool> {
        StateStore::restamp_serial(self, id, serial_no)
    }
}

/// Runs reindex passes against a store and owns their error channel.
#[derive(Clone)]
pub struct Reindexer<S = StateStore> {
    store: S,
    dead_letters: DeadLetterLog,
}

impl Reindexer<StateStore> {
    /// Delete a row, then run a reindex pass.
    ///
    /// Only the delete can fail; the pass outcome is reported, never raised.
    pub fn delete_row(&self, id: &str) -> StateResult<(Row, ReindexReport)> {
        let row = self.store.delete_row(id)?;
        let report = self.run();
        Ok((row, report))
    }
}

impl<S: RowSource> Reindexer<S> {
    pub fn new(store: S) -> Self {
        Self::with_dead_letters(store, DeadLetterLog::default())
    }

    pub fn with_dead_letters(store: S, dead_letters: DeadLetterLog) -> Self {
        Self {
            store,
            dead_letters,
        }
    }

    pub fn dead_letters(&self) -> &DeadLetterLog {
        &self.dead_letters
    }

    /// Re-stamp every row's serial number to its rank in creation order.
    pub fn run(&self) -> ReindexReport {
        let rows = match self.store.rows_in_creation_order() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "reindex aborted: could not read rows");
                self.dead_letters.push(ReindexFailure {
                    row_id: None,
                    serial_no: None,
                    error: e.to_string(),
                    at: epoch_millis(),
                });
                return ReindexReport {
                    failed: 1,
                    ..Default::default()
                };
            }
        };

        let mut report = ReindexReport {
            total: rows.len(),
            ..Default::default()
        };

        for (rank, row) in rows.iter().enumerate() {
            let serial_no = rank as u64 + 1;
            if row.serial_no == serial_no {
                continue;
            }
            match self.store.restamp_serial(&row.id, serial_no) {
                Ok(true) => report.restamped += 1,
                Ok(false) => debug!(id = %row.id, "row vanished during reindex"),
                Err(e) => {
                    warn!(id = %row.id, serial_no, error = %e, "failed to restamp row");
                    report.failed += 1;
                    self.dead_letters.push(ReindexFailure {
                        row_id: Some(row.id.clone()),
                        serial_no: Some(serial_no),
                        error: e.to_string(),
                        at: epoch_millis(),
                    });
                }
            }
        }

        info!(
            total = report.total,
            restamped = report.restamped,
            failed = report.failed,
            "serial numbers reindexed"
        );
        report
    }
}
