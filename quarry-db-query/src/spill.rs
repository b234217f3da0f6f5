//! External sorting for materializing operators
//!
//! `ExternalSorter` buffers (key, row) entries up to the materialization
//! budget; past it, the buffer is sorted and written out as a run (JSON
//! lines in an unlinked temp file), and `finish` k-way merges the runs
//! with the remaining in-memory tail. Under budget, nothing touches
//! disk.
//!
//! Runs are stably sorted and ties across runs resolve to the earlier
//! run, so the merge preserves input order among equal keys.

use crate::error::{QueryError, Result};
use crate::ops::sort::compare_keys;
use crate::solution::{Binding, Row};
use quarry_db_core::Error as CoreError;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use tracing::warn;

/// One buffered entry: precomputed sort keys plus the row itself.
pub(crate) type SortEntry = (Vec<Binding>, Row);

/// Budgeted sorter with temp-file spill.
pub(crate) struct ExternalSorter {
    budget: usize,
    descending: Vec<bool>,
    buffer: Vec<SortEntry>,
    runs: Vec<BufReader<File>>,
}

impl ExternalSorter {
    /// A sorter holding at most `budget` entries in memory.
    /// `descending` holds one direction flag per key position.
    pub fn new(budget: usize, descending: Vec<bool>) -> Self {
        Self {
            budget: budget.max(1),
            descending,
            buffer: Vec::new(),
            runs: Vec::new(),
        }
    }

    /// Buffer one entry, spilling a run when the budget is reached.
    pub fn push(&mut self, entry: SortEntry) -> Result<()> {
        self.buffer.push(entry);
        if self.buffer.len() >= self.budget {
            self.spill_run()?;
        }
        Ok(())
    }

    fn spill_run(&mut self) -> Result<()> {
        if self.runs.is_empty() {
            warn!(
                budget = self.budget,
                "materialization budget reached, spilling to disk"
            );
        }
        let descending = self.descending.clone();
        self.buffer
            .sort_by(|a, b| compare_keys(&a.0, &b.0, &descending));

        let file = tempfile::tempfile().map_err(store_err)?;
        let mut writer = BufWriter::new(file);
        for entry in self.buffer.drain(..) {
            let line = serde_json::to_string(&entry)
                .map_err(|e| QueryError::Core(CoreError::storage(format!("spill encode: {}", e))))?;
            writer.write_all(line.as_bytes()).map_err(store_err)?;
            writer.write_all(b"\n").map_err(store_err)?;
        }
        writer.flush().map_err(store_err)?;
        let mut file = writer
            .into_inner()
            .map_err(|e| QueryError::Core(CoreError::storage(format!("spill flush: {}", e))))?;
        file.seek(SeekFrom::Start(0)).map_err(store_err)?;
        self.runs.push(BufReader::new(file));
        Ok(())
    }

    /// Finish buffering and return the globally sorted stream.
    pub fn finish(mut self) -> Result<SortedRows> {
        let descending = self.descending.clone();
        self.buffer
            .sort_by(|a, b| compare_keys(&a.0, &b.0, &descending));

        if self.runs.is_empty() {
            return Ok(SortedRows::Memory(self.buffer.into_iter()));
        }

        let mut sources: Vec<RunSource> = self
            .runs
            .into_iter()
            .map(|reader| RunSource::File(reader))
            .collect();
        // The in-memory tail behaves as the last (newest) run.
        sources.push(RunSource::Memory(self.buffer.into_iter()));

        let mut heads = Vec::with_capacity(sources.len());
        for source in &mut sources {
            heads.push(source.next_entry()?);
        }
        Ok(SortedRows::Merge(KWayMerge {
            sources,
            heads,
            descending,
        }))
    }
}

/// A fully sorted entry stream.
pub(crate) enum SortedRows {
    Memory(std::vec::IntoIter<SortEntry>),
    Merge(KWayMerge),
}

impl SortedRows {
    /// Pull the next entry in sort order.
    pub fn next_entry(&mut self) -> Result<Option<SortEntry>> {
        match self {
            SortedRows::Memory(iter) => Ok(iter.next()),
            SortedRows::Merge(merge) => merge.next_entry(),
        }
    }
}

enum RunSource {
    File(BufReader<File>),
    Memory(std::vec::IntoIter<SortEntry>),
}

impl RunSource {
    fn next_entry(&mut self) -> Result<Option<SortEntry>> {
        match self {
            RunSource::Memory(iter) => Ok(iter.next()),
            RunSource::File(reader) => {
                let mut line = String::new();
                let read = reader.read_line(&mut line).map_err(store_err)?;
                if read == 0 {
                    return Ok(None);
                }
                let entry: SortEntry = serde_json::from_str(line.trim_end())
                    .map_err(|e| QueryError::Core(CoreError::corrupt(format!("spill decode: {}", e))))?;
                Ok(Some(entry))
            }
        }
    }
}

/// K-way merge over sorted runs; ties go to the earliest run so the
/// overall order is stable.
pub(crate) struct KWayMerge {
    sources: Vec<RunSource>,
    heads: Vec<Option<SortEntry>>,
    descending: Vec<bool>,
}

impl KWayMerge {
    fn next_entry(&mut self) -> Result<Option<SortEntry>> {
        let mut best: Option<usize> = None;
        for (i, head) in self.heads.iter().enumerate() {
            let Some(entry) = head else { continue };
            match best {
                None => best = Some(i),
                Some(b) => {
                    let current = self.heads[b].as_ref().map(|e| &e.0);
                    if let Some(current_keys) = current {
                        if compare_keys(&entry.0, current_keys, &self.descending)
                            == Ordering::Less
                        {
                            best = Some(i);
                        }
                    }
                }
            }
        }
        let Some(winner) = best else { return Ok(None) };
        let entry = self.heads[winner].take();
        self.heads[winner] = self.sources[winner].next_entry()?;
        Ok(entry)
    }
}

fn store_err(e: std::io::Error) -> QueryError {
    QueryError::Core(CoreError::storage(format!("spill I/O: {}", e)))
}
