// Flattened diff-item export and the one-line run summary

use std::path::Path;

use rust_decimal::Decimal;
use serde::Serialize;
use txrecon::{ReconCount, ReconError, ReconResultSet, RecordWriter};
use txrecon_io::{CsvWriter, LocalResource};

/// One CSV row: a diff item together with the entry it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRow {
    pub matching_key: String,
    pub result_type: String,
    pub party_transaction_id1: Option<String>,
    pub party_transaction_id2: Option<String>,
    pub item_type: Option<String>,
    pub item_key: Option<String>,
    pub party_value1: Option<String>,
    pub party_value2: Option<String>,
    pub matched: Option<bool>,
    pub difference: Option<Decimal>,
}

/// Rows in result-set order. An entry without items still gets one row.
pub fn item_rows(result: &ReconResultSet) -> Vec<ItemRow> {
    let mut rows = Vec::new();
    for entry in result.iter() {
        let base = ItemRow {
            matching_key: entry.matching_key.clone(),
            result_type: entry.label.to_string(),
            party_transaction_id1: entry.party_transaction_id1.clone(),
            party_transaction_id2: entry.party_transaction_id2.clone(),
            item_type: None,
            item_key: None,
            party_value1: None,
            party_value2: None,
            matched: None,
            difference: None,
        };
        if entry.items.is_empty() {
            rows.push(base);
            continue;
        }
        for item in &entry.items {
            rows.push(ItemRow {
                item_type: Some(item.item_type.clone()),
                item_key: Some(item.key.clone()),
                party_value1: item.party_value1.clone(),
                party_value2: item.party_value2.clone(),
                matched: Some(item.matched),
                difference: item.difference,
                ..base.clone()
            });
        }
    }
    rows
}

/// Write the flattened rows to `path`, returning how many were written.
pub fn write_items_csv(result: &ReconResultSet, path: &Path) -> Result<usize, ReconError> {
    let rows = item_rows(result);
    let mut writer = CsvWriter::new(LocalResource::new(path).for_write());
    writer.open()?;
    for row in &rows {
        writer.write(row)?;
    }
    writer.close()?;
    Ok(rows.len())
}

pub fn summary_line(name: &str, count: &ReconCount) -> String {
    format!(
        "{}: {} transactions, {} matched, {} mismatched, {} only in party 1, {} only in party 2",
        name,
        count.total(),
        count.matched,
        count.mismatched,
        count.party1_only,
        count.party2_only,
    )
}
