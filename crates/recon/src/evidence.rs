use crate::model::{ReconCount, ReconResultSet, ResultLabel};

/// Count summary over a finished result set.
pub fn compute_count(results: &ReconResultSet) -> ReconCount {
    let mut matched = 0;
    let mut mismatched = 0;

    for r in results.both_parties.values() {
        match r.label {
            ResultLabel::Matched => matched += 1,
            _ => mismatched += 1,
        }
    }

    ReconCount {
        matched,
        mismatched,
        party1_only: results.party1_only.len(),
        party2_only: results.party2_only.len(),
    }
}
