// JSON array reader over a Resource

use std::io::Read;

use serde::de::DeserializeOwned;
use txrecon::{IoOperation, ReconError, RecordReader};

use crate::resource::Resource;

/// Reads a JSON array of `T`.
///
/// The whole document is decoded on the first `read`. `records_at` selects a
/// nested array with a JSON pointer (`/data/items`) when the records are wrapped
/// in an envelope.
pub struct JsonReader<T, R: Resource> {
    resource: R,
    pointer: Option<String>,
    opened: bool,
    records: Option<std::vec::IntoIter<T>>,
}

impl<T, R: Resource> JsonReader<T, R> {
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            pointer: None,
            opened: false,
            records: None,
        }
    }

    pub fn records_at(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    fn bad_format(&self, message: impl std::fmt::Display) -> ReconError {
        ReconError::BadFormat {
            resource: self.resource.id().to_string(),
            message: message.to_string(),
        }
    }
}

impl<T: DeserializeOwned, R: Resource> JsonReader<T, R> {
    fn decode(&mut self) -> Result<Vec<T>, ReconError> {
        let mut bytes = Vec::new();
        self.resource
            .read_to_end(&mut bytes)
            .map_err(|e| ReconError::io(IoOperation::Read, self.resource.id(), &e))?;

        let Some(pointer) = self.pointer.as_deref() else {
            return serde_json::from_slice(&bytes).map_err(|e| self.bad_format(e));
        };

        let mut doc: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| self.bad_format(e))?;
        let nested = doc
            .pointer_mut(pointer)
            .map(serde_json::Value::take)
            .ok_or_else(|| self.bad_format(format!("no value at '{pointer}'")))?;
        serde_json::from_value(nested).map_err(|e| self.bad_format(e))
    }
}

impl<T: DeserializeOwned, R: Resource> RecordReader for JsonReader<T, R> {
    type Record = T;

    fn open(&mut self) -> Result<(), ReconError> {
        if self.opened {
            log::warn!("json reader '{}' is already opened", self.resource.id());
            return Ok(());
        }
        self.resource.open()?;
        self.opened = true;
        self.records = None;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<T>, ReconError> {
        if !self.opened {
            return Err(ReconError::NotOpened {
                resource: self.resource.id().to_string(),
            });
        }
        if self.records.is_none() {
            let decoded = self.decode()?;
            log::debug!("decoded {} records from {}", decoded.len(), self.resource.id());
            self.records = Some(decoded.into_iter());
        }
        Ok(self.records.as_mut().and_then(Iterator::next))
    }

    fn close(&mut self) -> Result<(), ReconError> {
        if !self.opened {
            log::info!("json reader '{}' is not opened, skip close", self.resource.id());
            return Ok(());
        }
        self.opened = false;
        self.records = None;
        self.resource.close()
    }
}
