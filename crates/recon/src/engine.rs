use crate::cancel::CancelToken;
use crate::classify::classify;
use crate::collection::Collection;
use crate::comparator::Comparator;
use crate::error::ReconError;
use crate::filter::Filter;
use crate::model::{DiffItem, ReconResultSet, ResultLabel, TxReconResult};
use crate::transaction::Transaction;

/// Joins two parties' collections by matching key and classifies every transaction.
///
/// A reconciler is consumed by [`Reconciler::process`]; build a new one (with
/// freshly opened collections) for another run.
pub struct Reconciler<C1: Collection, C2: Collection> {
    party1_id: String,
    party2_id: String,
    party1: C1,
    party2: C2,
    filter: Option<Box<dyn Filter>>,
    comparator: Box<dyn Comparator<C1::Tx, C2::Tx>>,
}

pub struct ReconcilerBuilder<C1: Collection, C2: Collection> {
    party1_id: String,
    party2_id: String,
    party1: Option<C1>,
    party2: Option<C2>,
    filter: Option<Box<dyn Filter>>,
    comparator: Option<Box<dyn Comparator<C1::Tx, C2::Tx>>>,
}

impl<C1: Collection, C2: Collection> Default for ReconcilerBuilder<C1, C2> {
    fn default() -> Self {
        Self {
            party1_id: "party1".into(),
            party2_id: "party2".into(),
            party1: None,
            party2: None,
            filter: None,
            comparator: None,
        }
    }
}

impl<C1: Collection, C2: Collection> ReconcilerBuilder<C1, C2> {
    pub fn party_ids(mut self, party1_id: impl Into<String>, party2_id: impl Into<String>) -> Self {
        self.party1_id = party1_id.into();
        self.party2_id = party2_id.into();
        self
    }

    pub fn party1(mut self, collection: C1) -> Self {
        self.party1 = Some(collection);
        self
    }

    pub fn party2(mut self, collection: C2) -> Self {
        self.party2 = Some(collection);
        self
    }

    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn comparator(mut self, comparator: impl Comparator<C1::Tx, C2::Tx> + 'static) -> Self {
        self.comparator = Some(Box::new(comparator));
        self
    }

    /// Fails with `ReconError::Config` when a collection or the comparator is missing.
    pub fn build(self) -> Result<Reconciler<C1, C2>, ReconError> {
        let party1 = self
            .party1
            .ok_or_else(|| ReconError::Config(format!("no collection for party '{}'", self.party1_id)))?;
        let party2 = self
            .party2
            .ok_or_else(|| ReconError::Config(format!("no collection for party '{}'", self.party2_id)))?;
        let comparator = self
            .comparator
            .ok_or_else(|| ReconError::Config("no comparator".into()))?;

        Ok(Reconciler {
            party1_id: self.party1_id,
            party2_id: self.party2_id,
            party1,
            party2,
            filter: self.filter,
            comparator,
        })
    }
}

#[derive(Debug, Default)]
struct PassStats {
    visited: usize,
    skipped: usize,
    found: usize,
}

impl<C1: Collection, C2: Collection> Reconciler<C1, C2> {
    pub fn builder() -> ReconcilerBuilder<C1, C2> {
        ReconcilerBuilder::default()
    }

    /// Run both passes. Any failure other than end-of-stream aborts the run and
    /// no partial result is returned.
    pub fn process(mut self, cancel: &CancelToken) -> Result<ReconResultSet, ReconError> {
        self.party1.open(cancel)?;

        let result = match self.party2.open(cancel) {
            Ok(()) => {
                let result = self.run_passes(cancel);
                if let Err(e) = self.party2.close() {
                    log::warn!("failed to close collection for '{}': {e}", self.party2_id);
                }
                result
            }
            Err(e) => Err(e),
        };

        if let Err(e) = self.party1.close() {
            log::warn!("failed to close collection for '{}': {e}", self.party1_id);
        }

        let result = result?;
        let count = result.count();
        log::info!(
            "reconciled '{}' against '{}': {} matched, {} mismatched, {} {}-only, {} {}-only",
            self.party1_id,
            self.party2_id,
            count.matched,
            count.mismatched,
            count.party1_only,
            self.party1_id,
            count.party2_only,
            self.party2_id,
        );
        Ok(result)
    }

    fn run_passes(&mut self, cancel: &CancelToken) -> Result<ReconResultSet, ReconError> {
        let mut out = ReconResultSet::default();

        let stats = self.compare_party2_against_party1(cancel, &mut out)?;
        log::debug!(
            "pass over '{}': {} read, {} filtered out, {} found in '{}'",
            self.party2_id,
            stats.visited,
            stats.skipped,
            stats.found,
            self.party1_id
        );

        let stats = self.compare_party1_against_party2(cancel, &mut out)?;
        log::debug!(
            "pass over '{}': {} read, {} filtered out, {} found in '{}'",
            self.party1_id,
            stats.visited,
            stats.skipped,
            stats.found,
            self.party2_id
        );

        Ok(out)
    }

    fn compare_party2_against_party1(
        &mut self,
        cancel: &CancelToken,
        out: &mut ReconResultSet,
    ) -> Result<PassStats, ReconError> {
        let mut stats = PassStats::default();

        loop {
            cancel.check()?;
            let Some(tx2) = self.party2.read()? else {
                break;
            };
            stats.visited += 1;

            if !admits(self.filter.as_deref(), tx2)? {
                stats.skipped += 1;
                continue;
            }

            let key = tx2.matching_key();
            let tx1 = self.party1.find(key);
            let items = self.comparator.compare(tx1, Some(tx2))?;

            match tx1 {
                Some(tx1) => {
                    stats.found += 1;
                    let result = both_parties_result(&self.party1_id, &self.party2_id, key, tx1, tx2, items);
                    out.both_parties.insert(key.to_string(), result);
                }
                None => {
                    let result = party2_only_result(&self.party1_id, &self.party2_id, tx2, items);
                    out.party2_only.insert(tx2.id().to_string(), result);
                }
            }
        }

        Ok(stats)
    }

    fn compare_party1_against_party2(
        &mut self,
        cancel: &CancelToken,
        out: &mut ReconResultSet,
    ) -> Result<PassStats, ReconError> {
        let mut stats = PassStats::default();

        loop {
            cancel.check()?;
            let Some(tx1) = self.party1.read()? else {
                break;
            };
            stats.visited += 1;

            if !admits(self.filter.as_deref(), tx1)? {
                stats.skipped += 1;
                continue;
            }

            let key = tx1.matching_key();
            let tx2 = self.party2.find(key);
            let items = self.comparator.compare(Some(tx1), tx2)?;

            match tx2 {
                Some(tx2) => {
                    stats.found += 1;
                    let result = both_parties_result(&self.party1_id, &self.party2_id, key, tx1, tx2, items);
                    out.both_parties.insert(key.to_string(), result);
                }
                None => {
                    let result = party1_only_result(&self.party1_id, &self.party2_id, tx1, items);
                    out.party1_only.insert(tx1.id().to_string(), result);
                }
            }
        }

        Ok(stats)
    }
}

fn admits(filter: Option<&dyn Filter>, tx: &dyn Transaction) -> Result<bool, ReconError> {
    match filter {
        Some(f) => f.filter(tx),
        None => Ok(true),
    }
}

/// Timestamp, type and canonical ids always come from party 1.
fn both_parties_result(
    party1_id: &str,
    party2_id: &str,
    matching_key: &str,
    tx1: &dyn Transaction,
    tx2: &dyn Transaction,
    items: Vec<DiffItem>,
) -> TxReconResult {
    TxReconResult {
        matching_key: matching_key.to_string(),
        label: classify(&items),
        transaction_timestamp: tx1.timestamp(),
        transaction_type: tx1.kind().to_string(),
        party_id1: party1_id.to_string(),
        party_id2: party2_id.to_string(),
        party_transaction_id1: Some(tx1.id().to_string()),
        party_transaction_id2: Some(tx2.id().to_string()),
        items,
    }
}

fn party1_only_result(
    party1_id: &str,
    party2_id: &str,
    tx1: &dyn Transaction,
    items: Vec<DiffItem>,
) -> TxReconResult {
    TxReconResult {
        matching_key: tx1.matching_key().to_string(),
        label: ResultLabel::Party1Only,
        transaction_timestamp: tx1.timestamp(),
        transaction_type: tx1.kind().to_string(),
        party_id1: party1_id.to_string(),
        party_id2: party2_id.to_string(),
        party_transaction_id1: Some(tx1.id().to_string()),
        party_transaction_id2: tx1.external_id().map(str::to_string),
        items,
    }
}

fn party2_only_result(
    party1_id: &str,
    party2_id: &str,
    tx2: &dyn Transaction,
    items: Vec<DiffItem>,
) -> TxReconResult {
    TxReconResult {
        matching_key: tx2.matching_key().to_string(),
        label: ResultLabel::Party2Only,
        transaction_timestamp: tx2.timestamp(),
        transaction_type: tx2.kind().to_string(),
        party_id1: party1_id.to_string(),
        party_id2: party2_id.to_string(),
        party_transaction_id1: tx2.external_id().map(str::to_string),
        party_transaction_id2: Some(tx2.id().to_string()),
        items,
    }
}
