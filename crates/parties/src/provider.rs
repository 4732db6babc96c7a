use std::any::Any;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use txrecon::Transaction;

use crate::filter::{HasStatus, StatusFilter};

pub const STATUS_COMPLETED: &str = "Completed";
pub const STATUS_CANCELED: &str = "Canceled";

/// Strftime format of `CREATION_DATE` in provider reports.
pub const CREATION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the provider's payout report.
///
/// `CREATION_DATE` must reach deserialization as RFC 3339; readers rewrite the
/// report's own format with a time transformer first. `LOCAL_AMOUNT` stays
/// text so that an unparseable amount surfaces as a mismatch, not a read error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    #[serde(rename = "CREATION_DATE")]
    pub creation_date: DateTime<Utc>,
    #[serde(rename = "EXTERNAL_TRANSACTION_ID")]
    pub external_transaction_id: String,
    #[serde(rename = "TRANSACTION_ID")]
    pub transaction_id: String,
    #[serde(rename = "LOCAL_CURRENCY")]
    pub local_currency: String,
    #[serde(rename = "LOCAL_AMOUNT")]
    pub local_amount: String,
    #[serde(rename = "STATUS")]
    pub status: String,
}

impl Transaction for Payout {
    fn matching_key(&self) -> &str {
        &self.external_transaction_id
    }

    fn id(&self) -> &str {
        &self.transaction_id
    }

    fn external_id(&self) -> Option<&str> {
        Some(&self.external_transaction_id)
    }

    fn kind(&self) -> &str {
        "payout"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.creation_date
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HasStatus for Payout {
    fn status(&self) -> &str {
        &self.status
    }
}

pub fn status_filter() -> StatusFilter<Payout> {
    StatusFilter::new([STATUS_COMPLETED, STATUS_CANCELED])
}
