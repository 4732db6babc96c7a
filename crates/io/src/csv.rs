// CSV record reader/writer over a Resource

use std::collections::HashMap;
use std::io::Write;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use txrecon::{IoOperation, ReconError, RecordReader, RecordWriter};

use crate::resource::Resource;
use crate::transform::FieldTransformer;

enum Stage<R: Resource> {
    Idle(R),
    Open {
        reader: csv::Reader<R>,
        headers: csv::StringRecord,
    },
    /// Source was absent and `skip_missing` is set: an empty stream.
    Missing(R),
    Poisoned,
}

/// Reads one `T` per CSV row, matching columns to fields by header name.
pub struct CsvReader<T, R: Resource> {
    id: String,
    stage: Stage<R>,
    delimiter: u8,
    trim: bool,
    strict: bool,
    skip_missing: bool,
    transformers: HashMap<String, Box<dyn FieldTransformer>>,
    _record: PhantomData<fn() -> T>,
}

impl<T, R: Resource> CsvReader<T, R> {
    pub fn new(resource: R) -> Self {
        Self {
            id: resource.id().to_string(),
            stage: Stage::Idle(resource),
            delimiter: b',',
            trim: true,
            strict: false,
            skip_missing: false,
            transformers: HashMap::new(),
            _record: PhantomData,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Strip surrounding whitespace from every cell (on by default).
    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Fail the read when a transformer rejects a value instead of logging and
    /// passing the raw cell through.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Treat a source that does not exist as empty.
    pub fn skip_missing(mut self, skip: bool) -> Self {
        self.skip_missing = skip;
        self
    }

    pub fn transform(mut self, column: impl Into<String>, transformer: impl FieldTransformer + 'static) -> Self {
        self.transformers.insert(column.into(), Box::new(transformer));
        self
    }

    fn csv_error(&self, operation: IoOperation, e: csv::Error) -> ReconError {
        if e.is_io_error() {
            ReconError::Io {
                operation,
                resource: self.id.clone(),
                message: e.to_string(),
                not_found: false,
            }
        } else {
            ReconError::BadFormat {
                resource: self.id.clone(),
                message: e.to_string(),
            }
        }
    }
}

fn prepare_row(
    row: &csv::StringRecord,
    headers: &csv::StringRecord,
    strict: bool,
    transformers: &HashMap<String, Box<dyn FieldTransformer>>,
) -> Result<csv::StringRecord, ReconError> {
    let mut out = csv::StringRecord::with_capacity(row.as_slice().len(), row.len());
    for (i, cell) in row.iter().enumerate() {
        let column = headers.get(i).unwrap_or("");
        match transformers.get(column) {
            Some(t) => match t.transform(cell) {
                Ok(value) => out.push_field(&value),
                Err(message) if strict => {
                    return Err(ReconError::Transform {
                        column: column.to_string(),
                        message,
                    });
                }
                Err(message) => {
                    log::warn!("column '{}': {}; keeping raw value", column, message);
                    out.push_field(cell);
                }
            },
            None => out.push_field(cell),
        }
    }
    Ok(out)
}

impl<T: DeserializeOwned, R: Resource> RecordReader for CsvReader<T, R> {
    type Record = T;

    fn open(&mut self) -> Result<(), ReconError> {
        let mut resource = match std::mem::replace(&mut self.stage, Stage::Poisoned) {
            Stage::Idle(resource) => resource,
            already => {
                log::warn!("csv reader '{}' is already opened", self.id);
                self.stage = already;
                return Ok(());
            }
        };

        if let Err(e) = resource.open() {
            if self.skip_missing && e.is_not_found() {
                log::info!("'{}' not found, reading as empty", self.id);
                self.stage = Stage::Missing(resource);
                return Ok(());
            }
            self.stage = Stage::Idle(resource);
            return Err(e);
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .trim(if self.trim { csv::Trim::All } else { csv::Trim::None })
            .from_reader(resource);
        let headers = match reader.headers().map(|h| h.clone()) {
            Ok(h) => h,
            Err(e) => {
                let err = self.csv_error(IoOperation::Read, e);
                // rewind to a closed resource so a retried open starts from the top
                let mut resource = reader.into_inner();
                if let Err(close_err) = resource.close() {
                    log::warn!("csv reader '{}': close after bad header: {}", self.id, close_err);
                }
                self.stage = Stage::Idle(resource);
                return Err(err);
            }
        };
        self.stage = Stage::Open { reader, headers };
        Ok(())
    }

    fn read(&mut self) -> Result<Option<T>, ReconError> {
        let (reader, headers) = match &mut self.stage {
            Stage::Open { reader, headers } => (reader, headers),
            Stage::Missing(_) => return Ok(None),
            Stage::Idle(_) | Stage::Poisoned => {
                return Err(ReconError::NotOpened { resource: self.id.clone() });
            }
        };

        let mut row = csv::StringRecord::new();
        let more = match reader.read_record(&mut row) {
            Ok(more) => more,
            Err(e) => return Err(self.csv_error(IoOperation::Read, e)),
        };
        if !more {
            return Ok(None);
        }

        let row = prepare_row(&row, headers, self.strict, &self.transformers)?;
        row.deserialize(Some(&*headers))
            .map(Some)
            .map_err(|e| ReconError::BadFormat {
                resource: self.id.clone(),
                message: e.to_string(),
            })
    }

    fn close(&mut self) -> Result<(), ReconError> {
        match std::mem::replace(&mut self.stage, Stage::Poisoned) {
            Stage::Open { reader, .. } => {
                let mut resource = reader.into_inner();
                let result = resource.close();
                self.stage = Stage::Idle(resource);
                result
            }
            Stage::Missing(resource) => {
                self.stage = Stage::Idle(resource);
                Ok(())
            }
            other => {
                log::info!("csv reader '{}' is not opened, skip close", self.id);
                self.stage = other;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

enum WriterStage<W: Resource + Write> {
    Idle(W),
    Open(csv::Writer<W>),
    Poisoned,
}

/// Writes one CSV row per record; the header row comes from `T`'s field names.
pub struct CsvWriter<T, W: Resource + Write> {
    id: String,
    stage: WriterStage<W>,
    _record: PhantomData<fn(&T)>,
}

impl<T, W: Resource + Write> CsvWriter<T, W> {
    pub fn new(resource: W) -> Self {
        Self {
            id: resource.id().to_string(),
            stage: WriterStage::Idle(resource),
            _record: PhantomData,
        }
    }

    /// Hands back the underlying resource, e.g. to inspect a memory sink.
    pub fn into_resource(self) -> Option<W> {
        match self.stage {
            WriterStage::Idle(resource) => Some(resource),
            WriterStage::Open(writer) => writer.into_inner().ok(),
            WriterStage::Poisoned => None,
        }
    }

    fn write_error(&self, e: impl std::fmt::Display) -> ReconError {
        ReconError::Io {
            operation: IoOperation::Write,
            resource: self.id.clone(),
            message: e.to_string(),
            not_found: false,
        }
    }
}

impl<T: Serialize, W: Resource + Write> RecordWriter for CsvWriter<T, W> {
    type Record = T;

    fn open(&mut self) -> Result<(), ReconError> {
        match std::mem::replace(&mut self.stage, WriterStage::Poisoned) {
            WriterStage::Idle(mut resource) => {
                if let Err(e) = resource.open() {
                    self.stage = WriterStage::Idle(resource);
                    return Err(e);
                }
                self.stage = WriterStage::Open(csv::Writer::from_writer(resource));
                Ok(())
            }
            other => {
                log::warn!("csv writer '{}' is already opened", self.id);
                self.stage = other;
                Ok(())
            }
        }
    }

    fn write(&mut self, record: &T) -> Result<(), ReconError> {
        let result = match &mut self.stage {
            WriterStage::Open(writer) => writer.serialize(record),
            _ => return Err(ReconError::NotOpened { resource: self.id.clone() }),
        };
        result.map_err(|e| self.write_error(e))
    }

    fn close(&mut self) -> Result<(), ReconError> {
        match std::mem::replace(&mut self.stage, WriterStage::Poisoned) {
            WriterStage::Open(writer) => {
                let mut resource = writer.into_inner().map_err(|e| self.write_error(e.error()))?;
                let result = resource.close();
                self.stage = WriterStage::Idle(resource);
                result
            }
            other => {
                log::info!("csv writer '{}' is not opened, skip close", self.id);
                self.stage = other;
                Ok(())
            }
        }
    }
}
