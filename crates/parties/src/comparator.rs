use rust_decimal::Decimal;
use txrecon::model::item_type;
use txrecon::{Comparator, DiffItem, ReconError};

use crate::{ledger, provider, Payout, Transfer};

/// Ledger transfer vs provider payout: status, currency, amount, in that order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayoutComparator;

impl PayoutComparator {
    pub fn new() -> Self {
        Self
    }
}

/// Ledger and provider use different status vocabularies.
fn status_equivalent(ledger_status: &str, provider_status: &str) -> bool {
    match ledger_status {
        ledger::STATUS_COMPLETED => provider_status == provider::STATUS_COMPLETED,
        ledger::STATUS_DECLINED => provider_status == provider::STATUS_CANCELED,
        _ => false,
    }
}

fn compare_status(t1: Option<&Transfer>, t2: Option<&Payout>) -> DiffItem {
    let v1 = t1.map(|t| t.status.as_str());
    let v2 = t2.map(|t| t.status.as_str());
    let matched = matches!((v1, v2), (Some(a), Some(b)) if status_equivalent(a, b));
    DiffItem::with_match(item_type::STATUS, "status", v1, v2, matched)
}

fn compare_currency(t1: Option<&Transfer>, t2: Option<&Payout>) -> DiffItem {
    DiffItem::text(
        item_type::CURRENCY,
        "currency",
        t1.map(|t| t.receiving_currency.as_str()),
        t2.map(|t| t.local_currency.as_str()),
    )
}

fn compare_amount(t1: Option<&Transfer>, t2: Option<&Payout>) -> DiffItem {
    let amount1 = t1.map(|t| t.receiving_amount);
    let Some(payout) = t2 else {
        return DiffItem::decimal(item_type::AMOUNT, "amount", amount1, None);
    };

    match payout.local_amount.trim().parse::<Decimal>() {
        Ok(amount2) => DiffItem::decimal(item_type::AMOUNT, "amount", amount1, Some(amount2)),
        Err(e) => {
            log::warn!(
                "payout {}: cannot parse amount '{}': {}",
                payout.transaction_id,
                payout.local_amount,
                e
            );
            let v1 = amount1.map(|a| a.to_string());
            DiffItem::with_match(
                item_type::AMOUNT,
                "amount",
                v1.as_deref(),
                Some(payout.local_amount.as_str()),
                false,
            )
        }
    }
}

impl Comparator<Transfer, Payout> for PayoutComparator {
    fn compare(&self, party1: Option<&Transfer>, party2: Option<&Payout>) -> Result<Vec<DiffItem>, ReconError> {
        Ok(vec![
            compare_status(party1, party2),
            compare_currency(party1, party2),
            compare_amount(party1, party2),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn transfer(status: &str, amount: &str, currency: &str) -> Transfer {
        Transfer {
            id: "tr-1".into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 31, 13, 45, 22).unwrap(),
            status: status.into(),
            receiving_amount: amount.parse().unwrap(),
            receiving_currency: currency.into(),
            provider_transaction_id: None,
        }
    }

    fn payout(status: &str, amount: &str, currency: &str) -> Payout {
        Payout {
            creation_date: Utc.with_ymd_and_hms(2024, 5, 31, 13, 45, 22).unwrap(),
            external_transaction_id: "tr-1".into(),
            transaction_id: "P-1".into(),
            local_currency: currency.into(),
            local_amount: amount.into(),
            status: status.into(),
        }
    }

    fn compare(t1: Option<&Transfer>, t2: Option<&Payout>) -> Vec<DiffItem> {
        PayoutComparator::new().compare(t1, t2).unwrap()
    }

    #[test]
    fn items_come_in_fixed_order() {
        let items = compare(Some(&transfer("completed", "1", "COP")), None);
        let keys: Vec<_> = items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, ["status", "currency", "amount"]);
        assert!(items.iter().all(|i| !i.matched));
    }

    #[test]
    fn status_vocabularies_map() {
        let cases = [
            ("completed", "Completed", true),
            ("declined", "Canceled", true),
            ("completed", "Canceled", false),
            ("declined", "Completed", false),
            ("pending", "Pending", false),
            ("completed", "completed", false),
        ];
        for (s1, s2, expected) in cases {
            let items = compare(Some(&transfer(s1, "1", "COP")), Some(&payout(s2, "1", "COP")));
            assert_eq!(items[0].matched, expected, "{s1} vs {s2}");
        }
    }

    #[test]
    fn amount_difference_is_provider_minus_ledger() {
        let items = compare(
            Some(&transfer("completed", "500.00", "COP")),
            Some(&payout("Completed", "450.00", "COP")),
        );
        let amount = &items[2];
        assert!(!amount.matched);
        assert_eq!(amount.party_value1.as_deref(), Some("500.00"));
        assert_eq!(amount.party_value2.as_deref(), Some("450.00"));
        assert_eq!(amount.difference.unwrap().to_string(), "-50.00");
    }

    #[test]
    fn equal_amounts_at_different_scale_match() {
        let items = compare(
            Some(&transfer("completed", "500", "COP")),
            Some(&payout("Completed", "500.00", "COP")),
        );
        assert!(items[2].matched);
        assert!(items[2].difference.unwrap().is_zero());
    }

    #[test]
    fn unparseable_amount_keeps_raw_value() {
        let items = compare(
            Some(&transfer("completed", "500.00", "COP")),
            Some(&payout("Completed", "5OO", "COP")),
        );
        let amount = &items[2];
        assert!(!amount.matched);
        assert_eq!(amount.party_value2.as_deref(), Some("5OO"));
        assert_eq!(amount.difference, None);
    }

    #[test]
    fn provider_only_side_reports_values() {
        let items = compare(None, Some(&payout("Completed", "10", "USD")));
        assert_eq!(items[1].party_value1, None);
        assert_eq!(items[1].party_value2.as_deref(), Some("USD"));
        assert_eq!(items[2].party_value2.as_deref(), Some("10"));
        assert_eq!(items[2].difference, None);
    }
}
