use std::marker::PhantomData;

use txrecon::transaction::downcast;
use txrecon::{Filter, ReconError, Transaction};

pub trait HasStatus {
    fn status(&self) -> &str;
}

/// Allow-list on one schema's status field.
///
/// Transactions of any other concrete type pass untouched, so one filter per
/// party can be stacked in a single `AllPass`. `strict()` turns a foreign type
/// into an `UnexpectedType` error instead.
pub struct StatusFilter<T> {
    statuses: Vec<String>,
    strict: bool,
    _schema: PhantomData<fn(&T)>,
}

impl<T> StatusFilter<T> {
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statuses: statuses.into_iter().map(Into::into).collect(),
            strict: false,
            _schema: PhantomData,
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }
}

impl<T: Transaction + HasStatus> Filter for StatusFilter<T> {
    fn filter(&self, tx: &dyn Transaction) -> Result<bool, ReconError> {
        let typed = if self.strict {
            downcast::<T>(tx)?
        } else {
            match tx.as_any().downcast_ref::<T>() {
                Some(t) => t,
                None => return Ok(true),
            }
        };
        Ok(self.statuses.iter().any(|s| s == typed.status()))
    }
}
