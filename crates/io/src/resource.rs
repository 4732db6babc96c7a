// Byte sources and sinks behind the record readers/writers

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use txrecon::{IoOperation, ReconError};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An openable byte stream identified by a path, URL or name.
///
/// Opening twice is a logged no-op, as is closing a resource that is not open.
pub trait Resource: Read {
    fn id(&self) -> &str;

    fn open(&mut self) -> Result<(), ReconError>;

    fn close(&mut self) -> Result<(), ReconError>;
}

impl<R: Resource + ?Sized> Resource for Box<R> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn open(&mut self) -> Result<(), ReconError> {
        (**self).open()
    }

    fn close(&mut self) -> Result<(), ReconError> {
        (**self).close()
    }
}

pub(crate) fn not_opened(id: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, format!("resource '{id}' is not opened"))
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// In-memory buffer. Reads start from the beginning on every open; writes append.
#[derive(Debug, Default)]
pub struct MemoryResource {
    id: String,
    contents: Vec<u8>,
    pos: usize,
    opened: bool,
}

impl MemoryResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn from_bytes(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { id: id.into(), contents: bytes.into(), ..Self::default() }
    }

    /// Everything written so far (or the seed bytes), still available after close.
    pub fn data(&self) -> &[u8] {
        &self.contents
    }
}

impl Resource for MemoryResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&mut self) -> Result<(), ReconError> {
        if self.opened {
            log::warn!("resource '{}' is already opened", self.id);
            return Ok(());
        }
        self.opened = true;
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ReconError> {
        if !self.opened {
            log::info!("resource '{}' is not opened, skip close", self.id);
        }
        self.opened = false;
        Ok(())
    }
}

impl Read for MemoryResource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.opened {
            return Err(not_opened(&self.id));
        }
        let remaining = &self.contents[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for MemoryResource {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.opened {
            return Err(not_opened(&self.id));
        }
        self.contents.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Local file
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct LocalResource {
    path: PathBuf,
    id: String,
    write: bool,
    file: Option<File>,
}

impl LocalResource {
    /// Read-only file resource.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            id: path.display().to_string(),
            path,
            write: false,
            file: None,
        }
    }

    /// Create or truncate the file on open.
    pub fn for_write(mut self) -> Self {
        self.write = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Resource for LocalResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&mut self) -> Result<(), ReconError> {
        if self.file.is_some() {
            log::warn!("resource '{}' is already opened", self.id);
            return Ok(());
        }
        let file = if self.write {
            File::create(&self.path)
        } else {
            File::open(&self.path)
        };
        self.file = Some(file.map_err(|e| ReconError::io(IoOperation::Open, &self.id, &e))?);
        Ok(())
    }

    fn close(&mut self) -> Result<(), ReconError> {
        let Some(mut file) = self.file.take() else {
            log::info!("resource '{}' is not opened, skip close", self.id);
            return Ok(());
        };
        if self.write {
            file.flush()
                .and_then(|_| file.sync_all())
                .map_err(|e| ReconError::io(IoOperation::Close, &self.id, &e))?;
        }
        Ok(())
    }
}

impl Read for LocalResource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Err(not_opened(&self.id)),
        }
    }
}

impl Write for LocalResource {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(not_opened(&self.id)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Body of a single GET request, fetched on open. No retries.
#[derive(Debug)]
pub struct HttpResource {
    url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    body: Option<io::Cursor<Vec<u8>>>,
}

impl HttpResource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request_error(&self, e: reqwest::Error) -> ReconError {
        ReconError::Io {
            operation: IoOperation::Open,
            resource: self.url.clone(),
            message: e.to_string(),
            not_found: false,
        }
    }
}

impl Resource for HttpResource {
    fn id(&self) -> &str {
        &self.url
    }

    fn open(&mut self) -> Result<(), ReconError> {
        if self.body.is_some() {
            log::warn!("resource '{}' is already opened", self.url);
            return Ok(());
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.request_error(e))?;

        let mut req = client.get(&self.url);
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req.send().map_err(|e| self.request_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReconError::HttpStatus {
                resource: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|e| self.request_error(e))?;
        log::debug!("fetched {} bytes from {}", bytes.len(), self.url);
        self.body = Some(io::Cursor::new(bytes.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), ReconError> {
        if self.body.take().is_none() {
            log::info!("resource '{}' is not opened, skip close", self.url);
        }
        Ok(())
    }
}

impl Read for HttpResource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.body.as_mut() {
            Some(body) => body.read(buf),
            None => Err(not_opened(&self.url)),
        }
    }
}
