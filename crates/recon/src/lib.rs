//! `txrecon`: two-party transaction reconciliation engine.
//!
//! Materializes each party's transaction stream into an indexed collection,
//! joins the two by matching key in two passes and classifies every
//! transaction as matched, mismatched (with per-field diffs) or present on
//! one side only. Format adapters live in `txrecon-io`.

pub mod cancel;
pub mod classify;
pub mod collection;
pub mod comparator;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod filter;
pub mod model;
pub mod stream;
pub mod transaction;

pub use cancel::CancelToken;
pub use collection::{Collection, MemoryCollection};
pub use comparator::Comparator;
pub use engine::{Reconciler, ReconcilerBuilder};
pub use error::ReconError;
pub use filter::{AllPass, Filter, TimestampFilter};
pub use model::{DiffItem, ReconCount, ReconResultSet, ResultLabel, TxReconResult};
pub use stream::{IoOperation, RecordReader, RecordWriter, VecReader};
pub use transaction::Transaction;
