use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Field-level diff
// ---------------------------------------------------------------------------

/// Field type tags shared by the bundled comparators.
pub mod item_type {
    pub const STATUS: &str = "status";
    pub const AMOUNT: &str = "amount";
    pub const CURRENCY: &str = "currency";
}

/// One field comparison between a party-1 and a party-2 transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffItem {
    /// Field type tag; drives result classification.
    #[serde(rename = "type")]
    pub item_type: String,
    pub key: String,
    pub party_value1: Option<String>,
    pub party_value2: Option<String>,
    pub matched: bool,
    /// `party2 - party1`, only for decimal fields with both sides present.
    pub difference: Option<Decimal>,
}

impl DiffItem {
    /// Compare two optional text values by equality.
    pub fn text(item_type: &str, key: &str, value1: Option<&str>, value2: Option<&str>) -> Self {
        let matched = matches!((value1, value2), (Some(a), Some(b)) if a == b);
        Self::with_match(item_type, key, value1, value2, matched)
    }

    /// Text values with an externally decided match; one absent side never matches.
    pub fn with_match(
        item_type: &str,
        key: &str,
        value1: Option<&str>,
        value2: Option<&str>,
        matched: bool,
    ) -> Self {
        Self {
            item_type: item_type.to_string(),
            key: key.to_string(),
            party_value1: value1.map(str::to_string),
            party_value2: value2.map(str::to_string),
            matched: matched && value1.is_some() && value2.is_some(),
            difference: None,
        }
    }

    /// Compare two optional decimals; the difference is set only when both are present.
    pub fn decimal(item_type: &str, key: &str, value1: Option<Decimal>, value2: Option<Decimal>) -> Self {
        let (matched, difference) = match (value1, value2) {
            (Some(a), Some(b)) => (a == b, Some(b - a)),
            _ => (false, None),
        };
        Self {
            item_type: item_type.to_string(),
            key: key.to_string(),
            party_value1: value1.map(|v| v.to_string()),
            party_value2: value2.map(|v| v.to_string()),
            matched,
            difference,
        }
    }
}

// ---------------------------------------------------------------------------
// Result labels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultLabel {
    Matched,
    /// Mismatches span two or more field types.
    Mismatched,
    /// Every mismatch shares this single field type tag.
    Field(String),
    Party1Only,
    Party2Only,
}

impl ResultLabel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Matched => "matched",
            Self::Mismatched => "mismatched",
            Self::Field(tag) => tag,
            Self::Party1Only => "party1_only",
            Self::Party2Only => "party2_only",
        }
    }
}

impl std::fmt::Display for ResultLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResultLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Per-key outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReconResult {
    pub matching_key: String,
    #[serde(rename = "result_type")]
    pub label: ResultLabel,
    pub transaction_timestamp: DateTime<Utc>,
    pub transaction_type: String,
    pub party_id1: String,
    pub party_id2: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_transaction_id1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_transaction_id2: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<DiffItem>,
}

// ---------------------------------------------------------------------------
// Result set + summary
// ---------------------------------------------------------------------------

/// Three-way partition produced by one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconResultSet {
    /// Keyed by matching key.
    pub both_parties: BTreeMap<String, TxReconResult>,
    /// Keyed by party-1 transaction id.
    pub party1_only: BTreeMap<String, TxReconResult>,
    /// Keyed by party-2 transaction id.
    pub party2_only: BTreeMap<String, TxReconResult>,
}

impl ReconResultSet {
    pub fn count(&self) -> ReconCount {
        crate::evidence::compute_count(self)
    }

    /// All entries, both-party entries first, each bucket in key order.
    pub fn iter(&self) -> impl Iterator<Item = &TxReconResult> {
        self.both_parties
            .values()
            .chain(self.party1_only.values())
            .chain(self.party2_only.values())
    }

    pub fn is_reconciled(&self) -> bool {
        let count = self.count();
        count.mismatched == 0 && count.party1_only == 0 && count.party2_only == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconCount {
    pub matched: usize,
    pub mismatched: usize,
    pub party1_only: usize,
    pub party2_only: usize,
}

impl ReconCount {
    pub fn total(&self) -> usize {
        self.matched + self.mismatched + self.party1_only + self.party2_only
    }
}
