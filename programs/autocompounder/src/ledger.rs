//! Append-only store of compound records.
//!
//! Single writer (the compound engine), many lagging readers: every staker
//! keeps its own cursor into the ledger and catches up independently.
//! Records are numbered `1..=len()`; the newest record always has
//! `index == len()`. Deletion only ever removes a contiguous suffix.
//!
//! While a journal is open every change is logged, so an aborted operation
//! can undo exactly the records it appended or removed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{AutocompounderError, Result},
    fixed_point::FixedPoint,
    state::CompoundRecord,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundLedger {
    records: Vec<CompoundRecord>,
    #[serde(skip)]
    journal: Option<Vec<Change>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    Appended,
    Removed(CompoundRecord),
}

impl CompoundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records; also the index of the newest one.
    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the next sequential record and return its index.
    pub fn append(&mut self, growth: FixedPoint) -> u64 {
        let index = self.len() + 1;
        self.records.push(CompoundRecord { index, growth });
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Change::Appended);
        }
        debug!(index, %growth, "compound record appended");
        index
    }

    pub fn get(&self, index: u64) -> Result<&CompoundRecord> {
        if index == 0 {
            return Err(AutocompounderError::RecordNotFound(index));
        }
        self.records
            .get((index - 1) as usize)
            .ok_or(AutocompounderError::RecordNotFound(index))
    }

    pub fn latest(&self) -> Option<&CompoundRecord> {
        self.records.last()
    }

    /// Records `from..=to`, failing if any of them is absent.
    pub fn range(&self, from: u64, to: u64) -> Result<&[CompoundRecord]> {
        if from > to {
            return Ok(&[]);
        }
        self.get(from)?;
        self.get(to)?;
        Ok(&self.records[(from - 1) as usize..to as usize])
    }

    /// Remove records from the newest down to, but excluding, `down_to`.
    /// Returns the number of records removed.
    pub fn delete_range(&mut self, down_to: u64) -> Result<u64> {
        let len = self.len();
        if down_to > len {
            return Err(AutocompounderError::OutOfSequence { expected: len, got: down_to });
        }
        let dropped = self.records.split_off(down_to as usize);
        if let Some(journal) = self.journal.as_mut() {
            journal.extend(dropped.into_iter().rev().map(Change::Removed));
        }
        let removed = len - down_to;
        debug!(removed, down_to, "compound records deleted");
        Ok(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompoundRecord> {
        self.records.iter()
    }

    /// Indices run 1, 2, … with no gaps. Walks every record.
    pub fn is_contiguous(&self) -> bool {
        self.records
            .iter()
            .enumerate()
            .all(|(i, r)| r.index == i as u64 + 1)
    }

    /// Constant-time check that the newest record sits at `len()`.
    pub fn tip_consistent(&self) -> bool {
        self.latest().map_or(true, |r| r.index == self.len())
    }

    // ─── Journal ──────────────────────────────────────────────────────────────

    pub(crate) fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    pub(crate) fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every change since `begin`, newest first.
    pub(crate) fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for change in journal.into_iter().rev() {
            match change {
                Change::Appended => {
                    self.records.pop();
                }
                Change::Removed(record) => self.records.push(record),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn growth(pct: u64) -> FixedPoint {
        FixedPoint::ONE
            .checked_add(FixedPoint::from_fraction(pct, 100).unwrap())
            .unwrap()
    }

    fn ledger_of(n: u64) -> CompoundLedger {
        let mut ledger = CompoundLedger::new();
        for i in 0..n {
            ledger.append(growth(i));
        }
        ledger
    }

    #[test]
    fn append_numbers_records_sequentially() {
        let mut ledger = CompoundLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.append(growth(10)), 1);
        assert_eq!(ledger.append(growth(5)), 2);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(1).unwrap().growth, growth(10));
        assert_eq!(ledger.latest().unwrap().index, 2);
        assert!(ledger.is_contiguous());
    }

    #[test]
    fn get_outside_the_ledger_is_not_found() {
        let ledger = ledger_of(3);
        assert_eq!(ledger.get(0), Err(AutocompounderError::RecordNotFound(0)));
        assert_eq!(ledger.get(4), Err(AutocompounderError::RecordNotFound(4)));
    }

    #[test]
    fn range_requires_both_ends() {
        let ledger = ledger_of(4);
        assert_eq!(ledger.range(2, 4).unwrap().len(), 3);
        assert!(ledger.range(3, 2).unwrap().is_empty());
        assert_eq!(ledger.range(3, 5), Err(AutocompounderError::RecordNotFound(5)));
    }

    #[test]
    fn delete_range_removes_a_suffix() {
        let mut ledger = ledger_of(5);
        assert_eq!(ledger.delete_range(2).unwrap(), 3);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(3), Err(AutocompounderError::RecordNotFound(3)));
        assert!(ledger.is_contiguous());

        // Appending after a deletion reuses the freed indices.
        assert_eq!(ledger.append(growth(1)), 3);
        assert!(ledger.is_contiguous());
    }

    #[test]
    fn delete_range_to_current_top_is_a_no_op() {
        let mut ledger = ledger_of(2);
        assert_eq!(ledger.delete_range(2).unwrap(), 0);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn delete_range_above_top_is_out_of_sequence() {
        let mut ledger = ledger_of(2);
        assert_eq!(
            ledger.delete_range(3),
            Err(AutocompounderError::OutOfSequence { expected: 2, got: 3 })
        );
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn rollback_restores_appends_and_deletions() {
        let mut ledger = ledger_of(3);
        let before = ledger.clone();

        ledger.begin();
        ledger.delete_range(1).unwrap();
        ledger.append(growth(40));
        ledger.rollback();
        assert_eq!(ledger, before);

        ledger.begin();
        ledger.append(growth(7));
        ledger.commit();
        ledger.rollback();
        assert_eq!(ledger.len(), 4);
        assert!(ledger.is_contiguous());
        assert!(ledger.tip_consistent());
    }

    #[test]
    fn delete_everything() {
        let mut ledger = ledger_of(3);
        ledger.delete_range(0).unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.latest().is_none());
    }
}
