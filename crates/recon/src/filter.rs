use chrono::{DateTime, Utc};

use crate::error::ReconError;
use crate::transaction::Transaction;

/// Decides whether a transaction takes part in reconciliation.
pub trait Filter {
    fn filter(&self, tx: &dyn Transaction) -> Result<bool, ReconError>;
}

impl<F> Filter for F
where
    F: Fn(&dyn Transaction) -> Result<bool, ReconError>,
{
    fn filter(&self, tx: &dyn Transaction) -> Result<bool, ReconError> {
        self(tx)
    }
}

/// AND-combinator: sub-filters run in order and evaluation stops at the first
/// rejection or error.
#[derive(Default)]
pub struct AllPass {
    filters: Vec<Box<dyn Filter>>,
}

impl AllPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Filter for AllPass {
    fn filter(&self, tx: &dyn Transaction) -> Result<bool, ReconError> {
        for f in &self.filters {
            if !f.filter(tx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Keeps transactions whose timestamp lies within `[start, end]`; either bound may be open.
#[derive(Debug, Clone, Default)]
pub struct TimestampFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimestampFilter {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }
}

impl Filter for TimestampFilter {
    fn filter(&self, tx: &dyn Transaction) -> Result<bool, ReconError> {
        let ts = tx.timestamp();
        if self.start.is_some_and(|start| ts < start) {
            return Ok(false);
        }
        if self.end.is_some_and(|end| ts > end) {
            return Ok(false);
        }
        Ok(true)
    }
}
