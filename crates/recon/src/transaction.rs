use std::any::Any;

use chrono::{DateTime, Utc};

use crate::error::ReconError;

/// What the engine needs to know about one party's transaction record.
pub trait Transaction: Any {
    /// Business key used to join party-1 and party-2 records.
    fn matching_key(&self) -> &str;

    fn id(&self) -> &str;

    /// Identifier the record carries for the other party, if any.
    fn external_id(&self) -> Option<&str>;

    fn kind(&self) -> &str;

    fn timestamp(&self) -> DateTime<Utc>;

    fn as_any(&self) -> &dyn Any;

    /// Concrete type name, for error messages.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Downcast a type-erased transaction, failing with `UnexpectedType`.
pub fn downcast<T: Transaction>(tx: &dyn Transaction) -> Result<&T, ReconError> {
    tx.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ReconError::UnexpectedType {
            expected: std::any::type_name::<T>().to_string(),
            found: tx.type_name().to_string(),
        })
}
