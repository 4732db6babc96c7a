use std::any::Any;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use txrecon::Transaction;

use crate::filter::{HasStatus, StatusFilter};

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_DECLINED: &str = "declined";

/// Outgoing transfer as recorded by the internal ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub receiving_amount: Decimal,
    pub receiving_currency: String,
    #[serde(default)]
    pub provider_transaction_id: Option<String>,
}

impl Transaction for Transfer {
    fn matching_key(&self) -> &str {
        &self.id
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn external_id(&self) -> Option<&str> {
        self.provider_transaction_id.as_deref()
    }

    fn kind(&self) -> &str {
        "payout"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HasStatus for Transfer {
    fn status(&self) -> &str {
        &self.status
    }
}

/// Final ledger states worth reconciling.
pub fn status_filter() -> StatusFilter<Transfer> {
    StatusFilter::new([STATUS_COMPLETED, STATUS_DECLINED])
}
