//! Streaming read/write contract between the engine and format adapters.
//!
//! A read yields `Ok(Some(record))`, `Ok(None)` at end-of-stream, or an error.
//! End-of-stream is never reported through `Err`.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::error::ReconError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IoOperation {
    Open,
    Read,
    Write,
    Close,
}

impl fmt::Display for IoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// One-pass source of typed records.
pub trait RecordReader {
    type Record;

    fn open(&mut self) -> Result<(), ReconError>;

    /// Next record, or `None` once the stream is exhausted.
    fn read(&mut self) -> Result<Option<Self::Record>, ReconError>;

    fn close(&mut self) -> Result<(), ReconError>;
}

/// Sink of typed records.
pub trait RecordWriter {
    type Record;

    fn open(&mut self) -> Result<(), ReconError>;

    fn write(&mut self, record: &Self::Record) -> Result<(), ReconError>;

    fn close(&mut self) -> Result<(), ReconError>;
}

impl<R: RecordReader + ?Sized> RecordReader for Box<R> {
    type Record = R::Record;

    fn open(&mut self) -> Result<(), ReconError> {
        (**self).open()
    }

    fn read(&mut self) -> Result<Option<Self::Record>, ReconError> {
        (**self).read()
    }

    fn close(&mut self) -> Result<(), ReconError> {
        (**self).close()
    }
}

/// Reader over records that are already in memory.
#[derive(Debug)]
pub struct VecReader<T> {
    pending: Option<VecDeque<T>>,
    records: Vec<T>,
}

impl<T> VecReader<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self { pending: None, records }
    }
}

impl<T> RecordReader for VecReader<T> {
    type Record = T;

    fn open(&mut self) -> Result<(), ReconError> {
        if self.pending.is_none() {
            self.pending = Some(std::mem::take(&mut self.records).into());
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Option<T>, ReconError> {
        match self.pending.as_mut() {
            Some(queue) => Ok(queue.pop_front()),
            None => Err(ReconError::NotOpened { resource: "memory".into() }),
        }
    }

    fn close(&mut self) -> Result<(), ReconError> {
        self.pending = None;
        Ok(())
    }
}
