//! Concrete party schemas for payout reconciliation: the internal ledger
//! (party 1, JSON transfers) against a payout provider's settlement report
//! (party 2, CSV rows).

pub mod comparator;
pub mod filter;
pub mod ledger;
pub mod provider;

pub use comparator::PayoutComparator;
pub use filter::{HasStatus, StatusFilter};
pub use ledger::Transfer;
pub use provider::Payout;
