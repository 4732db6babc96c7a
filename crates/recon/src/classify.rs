use crate::model::{DiffItem, ResultLabel};

/// Derive the overall label for a pair present on both sides.
///
/// - No mismatched item → `Matched`
/// - Every mismatched item shares one field type → that type (e.g. `amount`)
/// - Mismatches span two or more field types → `Mismatched`
pub fn classify(items: &[DiffItem]) -> ResultLabel {
    let mut mismatched_type: Option<&str> = None;

    for item in items.iter().filter(|i| !i.matched) {
        match mismatched_type {
            None => mismatched_type = Some(item.item_type.as_str()),
            Some(t) if t != item.item_type => return ResultLabel::Mismatched,
            Some(_) => {}
        }
    }

    match mismatched_type {
        None => ResultLabel::Matched,
        Some(t) => ResultLabel::Field(t.to_string()),
    }
}
