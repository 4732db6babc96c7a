use std::collections::HashMap;

use crate::cancel::CancelToken;
use crate::error::ReconError;
use crate::stream::RecordReader;
use crate::transaction::Transaction;

/// One party's transactions, re-readable in arrival order and indexed by matching key.
pub trait Collection {
    type Tx: Transaction;

    /// Materialize the underlying stream. Cancellation is checked before every read.
    fn open(&mut self, cancel: &CancelToken) -> Result<(), ReconError>;

    /// Next transaction in arrival order; `None` once the cursor passes the last one.
    fn read(&mut self) -> Result<Option<&Self::Tx>, ReconError>;

    /// Lookup by matching key, independent of the read cursor.
    fn find(&self, matching_key: &str) -> Option<&Self::Tx>;

    fn close(&mut self) -> Result<(), ReconError>;
}

/// Collection that drains a [`RecordReader`] into memory on `open`.
///
/// Duplicate matching keys keep every record in the sequential view, but
/// `find` returns the last one read.
pub struct MemoryCollection<R: RecordReader> {
    name: String,
    reader: R,
    items: Option<Vec<R::Record>>,
    index: HashMap<String, usize>,
    duplicates: Vec<String>,
    cursor: usize,
}

impl<R> MemoryCollection<R>
where
    R: RecordReader,
    R::Record: Transaction,
{
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            items: None,
            index: HashMap::new(),
            duplicates: Vec::new(),
            cursor: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.items.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matching keys that appeared more than once, in the order the repeats were seen.
    pub fn duplicate_keys(&self) -> &[String] {
        &self.duplicates
    }
}

type Loaded<T> = (Vec<T>, HashMap<String, usize>, Vec<String>);

fn drain<R>(name: &str, reader: &mut R, cancel: &CancelToken) -> Result<Loaded<R::Record>, ReconError>
where
    R: RecordReader,
    R::Record: Transaction,
{
    let mut items = Vec::new();
    let mut index = HashMap::new();
    let mut duplicates = Vec::new();

    loop {
        cancel.check()?;
        let Some(tx) = reader.read()? else {
            break;
        };
        let key = tx.matching_key().to_string();
        if index.insert(key.clone(), items.len()).is_some() {
            log::warn!("collection '{name}': duplicate matching key '{key}', keeping the later record");
            duplicates.push(key);
        }
        items.push(tx);
    }
    Ok((items, index, duplicates))
}

impl<R> Collection for MemoryCollection<R>
where
    R: RecordReader,
    R::Record: Transaction,
{
    type Tx = R::Record;

    fn open(&mut self, cancel: &CancelToken) -> Result<(), ReconError> {
        if self.items.is_some() {
            log::warn!("collection '{}' is already opened", self.name);
            return Ok(());
        }

        self.reader.open()?;

        let (items, index, duplicates) = match drain(&self.name, &mut self.reader, cancel) {
            Ok(loaded) => loaded,
            Err(e) => {
                if let Err(close_err) = self.reader.close() {
                    log::warn!("collection '{}': close after failed load: {}", self.name, close_err);
                }
                return Err(e);
            }
        };

        log::debug!(
            "collection '{}' opened with {} transactions ({} distinct keys)",
            self.name,
            items.len(),
            index.len()
        );

        self.items = Some(items);
        self.index = index;
        self.duplicates = duplicates;
        self.cursor = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<&R::Record>, ReconError> {
        let items = self.items.as_ref().ok_or_else(|| ReconError::NotOpened {
            resource: self.name.clone(),
        })?;
        let item = items.get(self.cursor);
        if item.is_some() {
            self.cursor += 1;
        }
        Ok(item)
    }

    fn find(&self, matching_key: &str) -> Option<&R::Record> {
        let pos = *self.index.get(matching_key)?;
        self.items.as_ref()?.get(pos)
    }

    fn close(&mut self) -> Result<(), ReconError> {
        self.reader.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::VecReader;
    use crate::transaction::testing::TestTx;

    fn collection(txs: Vec<TestTx>) -> MemoryCollection<VecReader<TestTx>> {
        MemoryCollection::new("test", VecReader::new(txs))
    }

    #[test]
    fn read_before_open_is_an_error() {
        let mut col = collection(vec![TestTx::new("A", "a1", "1")]);
        assert!(matches!(col.read(), Err(ReconError::NotOpened { .. })));
        assert!(col.find("A").is_none());
    }

    #[test]
    fn reads_in_arrival_order_and_finds_by_key() {
        let mut col = collection(vec![
            TestTx::new("B", "b1", "2"),
            TestTx::new("A", "a1", "1"),
        ]);
        col.open(&CancelToken::new()).unwrap();
        assert_eq!(col.len(), 2);

        assert_eq!(col.read().unwrap().unwrap().id, "b1");
        // lookup does not move the cursor
        assert_eq!(col.find("A").unwrap().id, "a1");
        assert_eq!(col.read().unwrap().unwrap().id, "a1");
        assert!(col.read().unwrap().is_none());
        assert!(col.read().unwrap().is_none());
        assert!(col.find("Z").is_none());
    }

    #[test]
    fn duplicate_key_overwrites_index_but_keeps_sequence() {
        let mut col = collection(vec![
            TestTx::new("A", "first", "1"),
            TestTx::new("A", "second", "2"),
        ]);
        col.open(&CancelToken::new()).unwrap();

        assert_eq!(col.find("A").unwrap().id, "second");
        assert_eq!(col.duplicate_keys(), ["A".to_string()]);
        assert_eq!(col.read().unwrap().unwrap().id, "first");
        assert_eq!(col.read().unwrap().unwrap().id, "second");
    }

    #[test]
    fn open_checks_cancellation() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut col = collection(vec![TestTx::new("A", "a1", "1")]);
        assert!(matches!(col.open(&cancel), Err(ReconError::Cancelled)));
        assert!(col.read().is_err());
    }

    struct FailingReader {
        yielded: bool,
    }

    impl RecordReader for FailingReader {
        type Record = TestTx;

        fn open(&mut self) -> Result<(), ReconError> {
            Ok(())
        }

        fn read(&mut self) -> Result<Option<TestTx>, ReconError> {
            if self.yielded {
                return Err(ReconError::BadFormat {
                    resource: "broken".into(),
                    message: "truncated".into(),
                });
            }
            self.yielded = true;
            Ok(Some(TestTx::new("A", "a1", "1")))
        }

        fn close(&mut self) -> Result<(), ReconError> {
            Ok(())
        }
    }

    #[test]
    fn open_propagates_reader_error() {
        let mut col = MemoryCollection::new("broken", FailingReader { yielded: false });
        let err = col.open(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, ReconError::BadFormat { .. }));
    }
}
