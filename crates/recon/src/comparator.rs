use crate::error::ReconError;
use crate::model::DiffItem;

/// Field-by-field comparison of a party-1 / party-2 pair.
///
/// Implementations must return items in a fixed field order, and are always
/// called as `(party1, party2)`. A `None` side means the transaction exists
/// only on the other party; every field that needs both sides must then
/// report `matched = false`.
pub trait Comparator<T1, T2> {
    fn compare(&self, party1: Option<&T1>, party2: Option<&T2>) -> Result<Vec<DiffItem>, ReconError>;
}

impl<T1, T2, F> Comparator<T1, T2> for F
where
    F: Fn(Option<&T1>, Option<&T2>) -> Result<Vec<DiffItem>, ReconError>,
{
    fn compare(&self, party1: Option<&T1>, party2: Option<&T2>) -> Result<Vec<DiffItem>, ReconError> {
        self(party1, party2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item_type;
    use crate::transaction::testing::TestTx;

    #[test]
    fn closures_are_comparators() {
        let cmp = |a: Option<&TestTx>, b: Option<&TestTx>| {
            Ok::<_, ReconError>(vec![DiffItem::decimal(
                item_type::AMOUNT,
                "amount",
                a.map(|t| t.amount),
                b.map(|t| t.amount),
            )])
        };
        let left = TestTx::new("A", "a1", "10.00");
        let right = TestTx::new("A", "a2", "10.00");
        let items = Comparator::compare(&cmp, Some(&left), Some(&right)).unwrap();
        assert!(items[0].matched);
        assert_eq!(items[0].difference.unwrap().to_string(), "0.00");
    }
}
